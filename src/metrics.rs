// Performance metrics module
//
// Lightweight counters for monitoring batch runs

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters kept for the lifetime of a processor
///
/// Uses atomic operations so the blocking decode tasks and the orchestration
/// loop can record without locks. Totals accumulate across runs.
#[derive(Debug)]
pub struct RunMetrics {
    /// Files handled, whatever their outcome
    pub files_processed: AtomicUsize,

    /// Files whose replay could not be decoded or analysed
    pub decode_failures: AtomicUsize,

    /// Files whose rename or delete failed
    pub action_failures: AtomicUsize,

    pub files_renamed: AtomicUsize,

    pub files_deleted: AtomicUsize,

    /// Sequences found across all files
    pub sequences_found: AtomicUsize,

    /// Time spent decoding and detecting, in microseconds
    pub total_analysis_time_us: AtomicU64,

    /// Number of completed or cancelled runs
    pub runs: AtomicUsize,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            files_processed: AtomicUsize::new(0),
            decode_failures: AtomicUsize::new(0),
            action_failures: AtomicUsize::new(0),
            files_renamed: AtomicUsize::new(0),
            files_deleted: AtomicUsize::new(0),
            sequences_found: AtomicUsize::new(0),
            total_analysis_time_us: AtomicU64::new(0),
            runs: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_failure(&self) {
        self.action_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_renamed(&self) {
        self.files_renamed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.files_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sequences(&self, count: usize) {
        self.sequences_found.fetch_add(count, Ordering::Relaxed);
    }

    /// Record decode plus detection time for one file
    pub fn record_analysis_time(&self, duration: Duration) {
        self.total_analysis_time_us.fetch_add(
            u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average analysis time per processed file in milliseconds
    pub fn avg_analysis_time_ms(&self) -> f64 {
        let total = self.total_analysis_time_us.load(Ordering::Relaxed);
        let count = self.files_processed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / 1000.0 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Replay Batch Metrics ===");
        tracing::info!(
            "Runs: {}, uptime: {:.2}s",
            self.runs.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
        tracing::info!(
            "Files: {} processed, {} renamed, {} deleted",
            self.files_processed.load(Ordering::Relaxed),
            self.files_renamed.load(Ordering::Relaxed),
            self.files_deleted.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Failures: {} decode, {} file action",
            self.decode_failures.load(Ordering::Relaxed),
            self.action_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Sequences found: {}, analysis time: {:.2}s (avg: {:.2}ms per file)",
            self.sequences_found.load(Ordering::Relaxed),
            self.total_analysis_time_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            self.avg_analysis_time_ms()
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.files_processed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.sequences_found.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_file_operations() {
        let metrics = RunMetrics::new();

        metrics.record_file_processed();
        metrics.record_file_processed();
        metrics.record_file_processed();
        metrics.record_renamed();
        metrics.record_deleted();
        metrics.record_decode_failure();
        metrics.record_action_failure();
        metrics.record_sequences(4);
        metrics.record_sequences(1);

        assert_eq!(metrics.files_processed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.files_renamed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.files_deleted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.decode_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.action_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.sequences_found.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_average_analysis_time() {
        let metrics = RunMetrics::new();

        metrics.record_file_processed();
        metrics.record_analysis_time(Duration::from_millis(10));
        metrics.record_file_processed();
        metrics.record_analysis_time(Duration::from_millis(30));

        assert_eq!(metrics.total_analysis_time_us.load(Ordering::Relaxed), 40_000);
        assert_eq!(metrics.avg_analysis_time_ms(), 20.0);
    }

    #[test]
    fn test_average_with_no_files() {
        assert_eq!(RunMetrics::new().avg_analysis_time_ms(), 0.0);
    }

    #[test]
    fn test_uptime() {
        let metrics = RunMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
