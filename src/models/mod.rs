//! Data models for the replay batch processor.
//!
//! - [`ProcessConfig`]: Immutable description of a run (root folder, detection mode, file actions)
//! - [`DetectionThresholds`]: Tunable grading policy for the combo detector
//! - [`GameReplay`]: Decoded replay (metadata plus per-frame player states)
//! - [`DetectedSequence`]: A combo or conversion found in a replay
//! - [`FileOutcome`]: Per-file result, appended to the run and never changed afterwards
//! - [`RunSummary`]: Aggregate handed to the caller when a run ends

pub mod config;
pub mod outcome;
pub mod replay;

pub use config::{ConfigError, DetectionMode, DetectionThresholds, ProcessConfig};
pub use outcome::{
    DetectedSequence, FailureKind, FileFailure, FileOutcome, RunState, RunSummary,
    SequenceGrade, format_elapsed,
};
pub use replay::{FRAMES_PER_SECOND, GameReplay, PlayerInfo, PlayerStateEvent, ReplayMetadata};
