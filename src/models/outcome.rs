use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::config::ProcessConfig;
use super::replay::FRAMES_PER_SECOND;

/// How strong a detected sequence is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceGrade {
    Conversion,
    Combo,
}

/// A run of punishes one player landed on an opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSequence {
    /// Player the sequence is attributed to (the attacker)
    pub player_index: u8,
    pub opponent_index: u8,
    pub start_frame: i32,
    pub end_frame: i32,
    pub moves: u32,
    pub start_percent: f32,
    pub end_percent: f32,
    pub did_kill: bool,
    pub grade: SequenceGrade,
}

impl DetectedSequence {
    /// Damage dealt over the sequence, in percent.
    pub fn damage(&self) -> f32 {
        (self.end_percent - self.start_percent).max(0.0)
    }

    pub fn duration_frames(&self) -> i32 {
        self.end_frame - self.start_frame
    }

    pub fn start_seconds(&self) -> f64 {
        f64::from(self.start_frame) / FRAMES_PER_SECOND
    }

    pub fn end_seconds(&self) -> f64 {
        f64::from(self.end_frame) / FRAMES_PER_SECOND
    }

    pub fn is_combo(&self) -> bool {
        self.grade == SequenceGrade::Combo
    }

    /// Whether two sequences share any frame.
    pub fn overlaps(&self, other: &DetectedSequence) -> bool {
        self.start_frame <= other.end_frame && other.start_frame <= self.end_frame
    }
}

/// Category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The replay could not be read or analysed
    Decode,
    /// The rename or delete could not be applied
    Action,
}

/// Failure captured on a [`FileOutcome`] instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FileFailure {
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Decode,
            message: message.into(),
        }
    }

    pub fn action(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Action,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::Decode => write!(f, "decode failed: {}", self.message),
            FailureKind::Action => write!(f, "file action failed: {}", self.message),
        }
    }
}

/// Result of processing one file. Built once and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: Utf8PathBuf,
    pub new_path: Option<Utf8PathBuf>,
    pub deleted: bool,
    pub sequences: Vec<DetectedSequence>,
    pub error: Option<FileFailure>,
}

impl FileOutcome {
    pub fn new(path: Utf8PathBuf, sequences: Vec<DetectedSequence>) -> Self {
        Self {
            path,
            new_path: None,
            deleted: false,
            sequences,
            error: None,
        }
    }

    pub fn failed(path: Utf8PathBuf, error: FileFailure) -> Self {
        Self {
            path,
            new_path: None,
            deleted: false,
            sequences: Vec::new(),
            error: Some(error),
        }
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Where the file lives after the run, if it still exists.
    pub fn current_path(&self) -> Option<&Utf8Path> {
        if self.deleted {
            None
        } else {
            Some(self.new_path.as_deref().unwrap_or(&self.path))
        }
    }

    /// File name of the original path.
    pub fn filename(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle of a processor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }
}

/// Aggregate over every file a run touched.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// `Completed` or `Cancelled`
    pub state: RunState,

    /// Number of files found when the run started
    pub total_files: usize,

    pub files_processed: usize,

    /// Sequences found across all files (combos or conversions, per the mode)
    pub combos_found: usize,

    pub elapsed: Duration,

    /// Per-file results in enumeration order
    pub outcomes: Vec<FileOutcome>,

    /// Result file written at the end of the run
    pub output_file: Option<Utf8PathBuf>,

    /// Why the result file could not be written
    pub output_error: Option<String>,
}

impl RunSummary {
    pub fn new(state: RunState, total_files: usize, outcomes: Vec<FileOutcome>, elapsed: Duration) -> Self {
        Self {
            state,
            total_files,
            files_processed: outcomes.len(),
            combos_found: outcomes.iter().map(FileOutcome::sequence_count).sum(),
            elapsed,
            outcomes,
            output_file: None,
            output_error: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    pub fn files_renamed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.new_path.is_some()).count()
    }

    pub fn files_deleted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.deleted).count()
    }

    pub fn files_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }

    /// All detected sequences, in file order.
    pub fn sequences(&self) -> impl Iterator<Item = &DetectedSequence> {
        self.outcomes.iter().flat_map(|o| o.sequences.iter())
    }

    /// One-line description of the finished run.
    pub fn message(&self, config: &ProcessConfig) -> String {
        let mut message = format!(
            "Processed {} files in {}",
            self.files_processed,
            format_elapsed(self.elapsed)
        );
        if config.find_combos {
            message.push_str(&format!(
                " and wrote {} {} to: {}",
                self.combos_found,
                config.mode.noun(),
                config.output_file
            ));
        }
        if self.is_cancelled() {
            message.push_str(" (stopped early)");
        }
        message
    }
}

/// Render a duration the way progress messages show it, e.g. `1h 02m 03s`, `4m 05s`, `2.5s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(start: i32, end: i32) -> DetectedSequence {
        DetectedSequence {
            player_index: 0,
            opponent_index: 1,
            start_frame: start,
            end_frame: end,
            moves: 3,
            start_percent: 10.0,
            end_percent: 52.5,
            did_kill: false,
            grade: SequenceGrade::Combo,
        }
    }

    #[test]
    fn test_sequence_damage_and_times() {
        let seq = sequence(60, 150);
        assert_eq!(seq.damage(), 42.5);
        assert_eq!(seq.duration_frames(), 90);
        assert_eq!(seq.start_seconds(), 1.0);
        assert_eq!(seq.end_seconds(), 2.5);
    }

    #[test]
    fn test_damage_never_negative() {
        let mut seq = sequence(0, 10);
        seq.end_percent = 0.0;
        assert_eq!(seq.damage(), 0.0);
    }

    #[test]
    fn test_overlap() {
        assert!(sequence(0, 10).overlaps(&sequence(10, 20)));
        assert!(!sequence(0, 10).overlaps(&sequence(11, 20)));
    }

    #[test]
    fn test_current_path() {
        let mut outcome = FileOutcome::new("/r/game.slp".into(), Vec::new());
        assert_eq!(outcome.current_path(), Some(Utf8Path::new("/r/game.slp")));
        assert_eq!(outcome.filename(), "game.slp");

        outcome.new_path = Some("/r/game_combo0.slp".into());
        assert_eq!(
            outcome.current_path(),
            Some(Utf8Path::new("/r/game_combo0.slp"))
        );

        outcome.deleted = true;
        assert_eq!(outcome.current_path(), None);
    }

    #[test]
    fn test_summary_counts() {
        let mut renamed = FileOutcome::new("/r/a.slp".into(), vec![sequence(0, 10), sequence(20, 30)]);
        renamed.new_path = Some("/r/a_2.slp".into());
        let mut deleted = FileOutcome::new("/r/b.slp".into(), Vec::new());
        deleted.deleted = true;
        let failed = FileOutcome::failed("/r/c.slp".into(), FileFailure::decode("bad"));

        let summary = RunSummary::new(
            RunState::Completed,
            3,
            vec![renamed, deleted, failed],
            Duration::from_secs(2),
        );

        assert_eq!(summary.files_processed, 3);
        assert_eq!(summary.combos_found, 2);
        assert_eq!(summary.files_renamed(), 1);
        assert_eq!(summary.files_deleted(), 1);
        assert_eq!(summary.files_failed(), 1);
        assert_eq!(summary.sequences().count(), 2);
    }

    #[test]
    fn test_summary_message() {
        let config = ProcessConfig::new("/r", "/r/combos.json");
        let summary = RunSummary::new(RunState::Completed, 0, Vec::new(), Duration::from_millis(1500));
        assert_eq!(
            summary.message(&config),
            "Processed 0 files in 1.5s and wrote 0 combos to: /r/combos.json"
        );

        let mut rename_only = config.clone();
        rename_only.find_combos = false;
        assert_eq!(summary.message(&rename_only), "Processed 0 files in 1.5s");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            FileFailure::action("permission denied").to_string(),
            "file action failed: permission denied"
        );
    }
}
