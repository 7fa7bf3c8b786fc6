// State management module
//
// This module provides the StateManager which tracks the lifecycle of a batch run
// behind Arc<RwLock<T>> and emits change events for anyone observing the run.

use crate::models::RunState;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, watch};

/// Change events emitted while a run progresses
///
/// These let observers follow a run without polling the state or owning the
/// progress callback.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A run has started and found `total` files
    RunStarted { total: usize },

    /// One file has been fully handled
    FileProcessed {
        index: usize,
        total: usize,
        filename: String,
        sequences: usize,
        failed: bool,
    },

    /// The run has reached a terminal state
    RunFinished {
        state: RunState,
        files_processed: usize,
    },
}

/// Snapshot of the current run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatus {
    pub state: RunState,

    /// Files handled so far
    pub progress: usize,

    pub total: usize,

    /// Name of the last file handled
    pub current_file: Option<String>,
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }
}

/// Thread-safe run state with event emission
///
/// - Provides shared access to [`RunStatus`] via `Arc<RwLock<T>>`
/// - Emits a [`StateChange`] for every transition
/// - Supports any number of subscribers via a tokio broadcast channel
///
/// Lock poisoning is not treated as fatal: the status is plain data and stays
/// consistent after a panicking writer.
pub struct StateManager {
    status: Arc<RwLock<RunStatus>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager in the `Idle` state with a 100 event buffer
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            status: Arc::new(RwLock::new(RunStatus::default())),
            state_tx,
        }
    }

    pub fn snapshot(&self) -> RunStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> RunState {
        self.read(|status| status.state)
    }

    /// Execute a function with read access to the status
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RunStatus) -> R,
    {
        let status = self.status.read().unwrap_or_else(PoisonError::into_inner);
        f(&status)
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn update<F>(&self, update_fn: F, event: StateChange) -> StateChange
    where
        F: FnOnce(&mut RunStatus),
    {
        {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            update_fn(&mut status);
        }

        // Ignore send errors - it's OK if no one is listening
        let _ = self.state_tx.send(event.clone());
        event
    }

    /// Enter `Running` before the file list is known
    ///
    /// Clears the previous run's progress so a run that fails its pre-flight
    /// reports no processed files. No event is emitted until
    /// [`start_run`](Self::start_run) knows the total.
    pub fn begin_run(&self) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        *status = RunStatus {
            state: RunState::Running,
            ..RunStatus::default()
        };
    }

    /// Enter `Running` for a run over `total` files
    pub fn start_run(&self, total: usize) -> StateChange {
        self.update(
            |status| {
                *status = RunStatus {
                    state: RunState::Running,
                    progress: 0,
                    total,
                    current_file: None,
                };
            },
            StateChange::RunStarted { total },
        )
    }

    /// Record that the file at 1-based `index` is done
    pub fn file_processed(
        &self,
        index: usize,
        filename: &str,
        sequences: usize,
        failed: bool,
    ) -> StateChange {
        let total = self.read(|status| status.total);
        self.update(
            |status| {
                status.progress = index;
                status.current_file = Some(filename.to_string());
            },
            StateChange::FileProcessed {
                index,
                total,
                filename: filename.to_string(),
                sequences,
                failed,
            },
        )
    }

    /// Enter a terminal state
    pub fn finish_run(&self, state: RunState) -> StateChange {
        let files_processed = self.read(|status| status.progress);
        self.update(
            |status| {
                status.state = state;
                status.current_file = None;
            },
            StateChange::RunFinished {
                state,
                files_processed,
            },
        )
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            status: Arc::clone(&self.status),
            state_tx: self.state_tx.clone(),
        }
    }
}

/// Cooperative stop signal for a single run.
///
/// Cloned handles share one watch channel; once cancelled a token stays cancelled.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
