//! Integration tests for run state tracking
//!
//! These tests verify:
//! - The broadcast event stream mirrors the progress callback
//! - State transitions across consecutive runs
//! - Cancellation tokens shared across threads

mod common;

use common::{replay_with_combos, temp_root, write_replay};
use replay_batch::models::{ProcessConfig, RunState};
use replay_batch::{BatchProcessor, CancellationToken, StateChange, StateManager};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_event_stream_matches_callbacks() {
    let (_temp_dir, root) = temp_root();
    for i in 0..4 {
        write_replay(&root, &format!("game{}.slp", i), &replay_with_combos(i));
    }

    let processor = Arc::new(BatchProcessor::with_defaults());
    let mut rx = processor.subscribe();

    let runner = Arc::clone(&processor);
    let config = ProcessConfig::new(&root, root.join("combos.json"));
    let handle = tokio::spawn(async move {
        let mut callbacks = Vec::new();
        let summary = runner
            .process(&config, |update| {
                callbacks.push((update.index, update.outcome.sequence_count()))
            })
            .await
            .unwrap();
        (summary, callbacks)
    });

    let mut events = Vec::new();
    loop {
        let event = rx.recv().await.unwrap();
        let done = matches!(event, StateChange::RunFinished { .. });
        events.push(event);
        if done {
            break;
        }
    }
    let (summary, callbacks) = handle.await.unwrap();

    assert_eq!(events.first(), Some(&StateChange::RunStarted { total: 4 }));
    let processed: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            StateChange::FileProcessed {
                index, sequences, ..
            } => Some((*index, *sequences)),
            _ => None,
        })
        .collect();
    assert_eq!(processed, callbacks);
    assert_eq!(
        events.last(),
        Some(&StateChange::RunFinished {
            state: RunState::Completed,
            files_processed: 4,
        })
    );
    assert_eq!(summary.combos_found, 6);
}

#[tokio::test]
async fn test_states_across_runs() {
    let (_temp_dir, root) = temp_root();
    write_replay(&root, "a.slp", &replay_with_combos(1));

    let processor = BatchProcessor::with_defaults();
    assert_eq!(processor.state(), RunState::Idle);

    let config = ProcessConfig::new(&root, root.join("combos.json"));
    processor.process(&config, |_| {}).await.unwrap();
    assert_eq!(processor.state(), RunState::Completed);

    let missing = ProcessConfig::new(root.join("missing"), root.join("combos.json"));
    assert!(processor.process(&missing, |_| {}).await.is_err());
    assert_eq!(processor.state(), RunState::Failed);

    // Failed is terminal, so a new run is accepted
    let summary = processor.process(&config, |_| {}).await.unwrap();
    assert_eq!(summary.state, RunState::Completed);
}

#[test]
fn test_state_manager_snapshot_tracks_progress() {
    let manager = StateManager::new();
    manager.start_run(3);
    manager.file_processed(1, "a.slp", 2, false);
    manager.file_processed(2, "b.slp", 0, true);

    let status = manager.snapshot();
    assert!(status.is_running());
    assert_eq!(status.progress, 2);
    assert_eq!(status.total, 3);
    assert_eq!(status.current_file.as_deref(), Some("b.slp"));
}

#[test]
fn test_token_cancel_seen_across_threads() {
    let token = CancellationToken::new();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let token = token.clone();
            std::thread::spawn(move || {
                while !token.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    token.cancel();

    for waiter in waiters {
        waiter.join().unwrap();
    }
}
