//! Services module - the per-file building blocks of a batch run.
//!
//! Everything here is synchronous and free of run state, so each piece can be
//! tested on its own. The [`crate::processor`] module strings them together.
//!
//! # Components
//!
//! - [`enumerator`]: lazy, restartable discovery of replay files under a root
//! - [`decoder`]: the [`ReplayDecoder`] seam over the replay file format, with a
//!   JSON document implementation
//! - [`detector`]: [`ComboDetector`], which finds and grades combos and conversions
//! - [`actions`]: [`FileActionResolver`] decides whether a file is renamed or deleted,
//!   and [`apply`] performs that on disk
//! - [`template`]: parsing and rendering of rename templates such as `{stem}_combo{count}`
//! - [`writer`]: [`ResultWriter`] persists the detected sequences of a run
//!
//! # Errors
//!
//! Each service owns its error type. Decode and action errors are turned into a
//! [`crate::models::FileFailure`] by the processor rather than aborting the run.

pub mod actions;
pub mod decoder;
pub mod detector;
pub mod enumerator;
pub mod template;
pub mod writer;

pub use actions::{ActionError, AppliedAction, FileAction, FileActionResolver, RenameContext, apply};
pub use decoder::{DecodeError, JsonReplayDecoder, REPLAY_EXTENSION, ReplayDecoder};
pub use detector::ComboDetector;
pub use enumerator::{ReplayScan, ScanError, enumerate};
pub use template::{RenameTemplate, TemplateContext, TemplateError, Token};
pub use writer::{
    JsonResultWriter, ResultRecord, ResultWriter, SequenceRecord, WriteError, read_results,
};
