// Replay Batch - combo scanning and file housekeeping for game replay folders
//
// This is the library crate containing the batch processing core. Launchers and
// user interfaces supply a ProcessConfig and a progress callback, and receive a
// RunSummary when the run ends.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{load_process_config, save_process_config};
pub use models::{
    DetectedSequence, DetectionMode, DetectionThresholds, FileOutcome, ProcessConfig, RunState,
    RunSummary,
};
pub use processor::{BatchProcessor, ProcessError, ProgressUpdate};
pub use state::{CancellationToken, StateChange, StateManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
