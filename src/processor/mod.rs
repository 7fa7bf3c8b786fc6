//! Batch orchestration.
//!
//! [`BatchProcessor::process`] drives one run: it enumerates the replay files
//! up front so the total is stable, then handles each file strictly in order
//! (decode, detect, resolve, apply) and reports progress after every file.
//!
//! ```text
//! Idle ──process()──▶ Running ──▶ Completed
//!                        │    └──▶ Cancelled   (stop() observed between files)
//!                        └───────▶ Failed      (invalid config or missing root)
//! ```
//!
//! Per-file failures never end a run. They are recorded on that file's
//! [`FileOutcome`] and the next file is processed.

use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::metrics::RunMetrics;
use crate::models::{
    ConfigError, DetectedSequence, FailureKind, FileFailure, FileOutcome, ProcessConfig, ReplayMetadata,
    RunState, RunSummary,
};
use crate::services::{
    ComboDetector, DecodeError, FileActionResolver, JsonReplayDecoder, JsonResultWriter,
    RenameContext, ReplayDecoder, ResultRecord, ResultWriter, ScanError, apply, enumerate,
};
use crate::state::{CancellationToken, StateChange, StateManager};

/// Errors that stop a run before any file is processed
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    NotFound(#[from] ScanError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("A batch run is already in progress")]
    AlreadyRunning,
}

/// Progress report for one finished file.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate<'a> {
    /// 1-based position of the file in the run
    pub index: usize,
    pub total: usize,

    /// File name as it was before any rename
    pub filename: &'a str,

    pub outcome: &'a FileOutcome,
}

impl ProgressUpdate<'_> {
    /// Share of the run completed, rounded to a whole percent.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.index as f64 / self.total as f64) * 100.0).round() as u8
    }

    /// Log line for this file, or `None` when there is nothing worth showing.
    pub fn message(&self, config: &ProcessConfig) -> Option<String> {
        let outcome = self.outcome;
        if let Some(error) = &outcome.error {
            return Some(format!("Failed {}: {}", self.filename, error));
        }

        let new_name = outcome
            .new_path
            .as_deref()
            .map(|p| p.file_name().unwrap_or(p.as_str()));

        if config.find_combos {
            if outcome.deleted {
                Some(format!("Deleted {}", self.filename))
            } else {
                Some(format!(
                    "Found {} {} in: {}",
                    outcome.sequence_count(),
                    config.mode.noun(),
                    new_name.unwrap_or(self.filename)
                ))
            }
        } else {
            new_name.map(|new_name| format!("Renamed {} to {}", self.filename, new_name))
        }
    }
}

/// Runs batches of replay files through detection and file actions.
///
/// One processor runs at most one batch at a time; a second [`process`](Self::process)
/// call while a run is active is rejected with [`ProcessError::AlreadyRunning`].
pub struct BatchProcessor {
    decoder: Arc<dyn ReplayDecoder>,
    writer: Arc<dyn ResultWriter>,
    state: StateManager,

    /// Token of the active run, if any
    active: Mutex<Option<CancellationToken>>,

    metrics: Arc<RunMetrics>,
}

/// Clears the active-run slot when a run ends, including when the run's
/// future is dropped before it finishes.
struct ActiveRun<'a> {
    processor: &'a BatchProcessor,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.processor.state.state() == RunState::Running {
            tracing::warn!("Batch run dropped before finishing");
            self.processor.state.finish_run(RunState::Cancelled);
        }
        *self
            .processor
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl BatchProcessor {
    pub fn new(decoder: Arc<dyn ReplayDecoder>, writer: Arc<dyn ResultWriter>) -> Self {
        Self {
            decoder,
            writer,
            state: StateManager::new(),
            active: Mutex::new(None),
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    /// Processor reading JSON replay documents and writing JSON results.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(JsonReplayDecoder::new()), Arc::new(JsonResultWriter::new()))
    }

    pub fn state(&self) -> RunState {
        self.state.state()
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Receive a [`StateChange`] for every transition and processed file.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Ask the active run to stop before its next file.
    ///
    /// The file being processed is finished first. No-op when idle.
    pub fn stop(&self) {
        match self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) => {
                tracing::info!("Stop requested for the active batch run");
                token.cancel();
            }
            None => tracing::debug!("Stop requested with no active run"),
        }
    }

    /// Process every replay under `config.root`.
    ///
    /// `on_progress` is called once per file, in enumeration order, on the
    /// task driving this future.
    pub async fn process<F>(
        &self,
        config: &ProcessConfig,
        mut on_progress: F,
    ) -> Result<RunSummary, ProcessError>
    where
        F: FnMut(ProgressUpdate<'_>),
    {
        let token = self.begin_run()?;
        let _active = ActiveRun { processor: self };
        self.state.begin_run();
        let started = Instant::now();

        let (files, detector, resolver) = match self.prepare(config) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!("Batch run failed to start: {}", e);
                self.state.finish_run(RunState::Failed);
                return Err(e);
            }
        };

        let total = files.len();
        self.state.start_run(total);
        tracing::info!(
            "Processing {} replays in {} (subfolders: {}, find combos: {}, rename: {}, delete empty: {})",
            total,
            config.root,
            config.include_subfolders,
            config.find_combos,
            config.rename_enabled,
            config.deletes_empty_files()
        );

        let mut outcomes = Vec::with_capacity(total);
        for (position, path) in files.into_iter().enumerate() {
            if token.is_cancelled() {
                tracing::info!("Batch run stopped after {} of {} files", position, total);
                break;
            }

            let index = position + 1;
            let outcome = self
                .process_file(path, index, config, &detector, &resolver)
                .await;
            self.record_outcome(&outcome);

            self.state.file_processed(
                index,
                outcome.filename(),
                outcome.sequence_count(),
                !outcome.is_ok(),
            );
            on_progress(ProgressUpdate {
                index,
                total,
                filename: outcome.filename(),
                outcome: &outcome,
            });

            outcomes.push(outcome);
        }

        let final_state = if token.is_cancelled() {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        let mut summary = RunSummary::new(final_state, total, outcomes, started.elapsed());

        if config.find_combos {
            self.write_results(&mut summary, &config.output_file);
        }

        self.state.finish_run(final_state);
        self.metrics.record_run();
        tracing::info!("{}", summary.message(config));
        self.metrics.log_summary();

        Ok(summary)
    }

    fn begin_run(&self) -> Result<CancellationToken, ProcessError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            tracing::warn!("Rejected a batch run while another is in progress");
            return Err(ProcessError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());
        Ok(token)
    }

    /// Pre-flight: validate, build the per-run services and list the files.
    fn prepare(
        &self,
        config: &ProcessConfig,
    ) -> Result<(Vec<Utf8PathBuf>, ComboDetector, FileActionResolver), ProcessError> {
        config.validate()?;
        let resolver = FileActionResolver::for_config(config).map_err(ConfigError::from)?;
        let detector = ComboDetector::new(config.thresholds.clone());

        let scan = enumerate(
            &config.root,
            config.include_subfolders,
            self.decoder.file_extension(),
        )?;
        let files: Vec<Utf8PathBuf> = scan.iter().collect();

        Ok((files, detector, resolver))
    }

    async fn process_file(
        &self,
        path: Utf8PathBuf,
        index: usize,
        config: &ProcessConfig,
        detector: &ComboDetector,
        resolver: &FileActionResolver,
    ) -> FileOutcome {
        let (sequences, metadata) = match self.analyse(&path, config, detector).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path, e);
                return FileOutcome::failed(path, FileFailure::decode(e.to_string()));
            }
        };
        tracing::debug!("Found {} sequences in {}", sequences.len(), path);

        let mut outcome = FileOutcome::new(path, sequences);
        let ctx = RenameContext {
            index,
            metadata: Some(&metadata),
        };

        let applied = resolver
            .resolve(&outcome, config, &ctx)
            .and_then(|action| apply(&action, &outcome.path));

        match applied {
            Ok(applied) => {
                outcome.new_path = applied.new_path;
                outcome.deleted = applied.deleted;
            }
            Err(e) => {
                tracing::warn!("File action failed for {}: {}", outcome.path, e);
                outcome.error = Some(FileFailure::action(e.to_string()));
            }
        }

        outcome
    }

    /// Decode and detect on the blocking pool so the runtime stays responsive.
    async fn analyse(
        &self,
        path: &Utf8Path,
        config: &ProcessConfig,
        detector: &ComboDetector,
    ) -> Result<(Vec<DetectedSequence>, ReplayMetadata), DecodeError> {
        let decoder = Arc::clone(&self.decoder);
        let detector = detector.clone();
        let owned_path = path.to_path_buf();
        let find_combos = config.find_combos;
        let mode = config.mode;

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || -> Result<_, DecodeError> {
            let replay = decoder.decode(&owned_path)?;
            let sequences = if find_combos {
                detector.detect(&replay, mode)?
            } else {
                Vec::new()
            };
            Ok((sequences, replay.metadata))
        })
        .await;
        self.metrics.record_analysis_time(started.elapsed());

        result.unwrap_or_else(|e| {
            Err(DecodeError::Malformed(format!(
                "analysis of {} did not complete: {}",
                path, e
            )))
        })
    }

    fn record_outcome(&self, outcome: &FileOutcome) {
        self.metrics.record_file_processed();
        self.metrics.record_sequences(outcome.sequence_count());
        if outcome.deleted {
            self.metrics.record_deleted();
        }
        if outcome.new_path.is_some() {
            self.metrics.record_renamed();
        }
        if let Some(failure) = &outcome.error {
            match failure.kind {
                FailureKind::Decode => self.metrics.record_decode_failure(),
                FailureKind::Action => self.metrics.record_action_failure(),
            }
        }
    }

    fn write_results(&self, summary: &mut RunSummary, output_file: &Utf8Path) {
        let records = ResultRecord::from_outcomes(&summary.outcomes);
        match self.writer.write(&records, output_file) {
            Ok(()) => summary.output_file = Some(output_file.to_path_buf()),
            Err(e) => {
                tracing::error!("Failed to write combo file: {}", e);
                summary.output_error = Some(e.to_string());
            }
        }
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::with_defaults()
    }
}
