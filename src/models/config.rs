use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::template::{RenameTemplate, TemplateError};

/// Which grade of detected sequence a run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    #[default]
    OnlyCombos,
    OnlyConversions,
}

impl DetectionMode {
    /// Noun used in file names and log lines ("combos" / "conversions").
    pub fn noun(self) -> &'static str {
        match self {
            DetectionMode::OnlyCombos => "combos",
            DetectionMode::OnlyConversions => "conversions",
        }
    }
}

/// Tunable grading policy for the combo detector.
///
/// The defaults are conservative choices, not authoritative values:
/// - 45 frames (0.75s) of opponent control before a run closes
/// - a conversion needs at least one landed move
/// - a combo needs at least 3 moves and 30% damage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionThresholds {
    #[serde(default = "default_gap_tolerance_frames")]
    pub gap_tolerance_frames: u32,

    #[serde(default = "default_conversion_min_moves")]
    pub conversion_min_moves: u32,

    #[serde(default = "default_combo_min_moves")]
    pub combo_min_moves: u32,

    #[serde(default = "default_combo_min_damage")]
    pub combo_min_damage: f32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            gap_tolerance_frames: default_gap_tolerance_frames(),
            conversion_min_moves: default_conversion_min_moves(),
            combo_min_moves: default_combo_min_moves(),
            combo_min_damage: default_combo_min_damage(),
        }
    }
}

fn default_gap_tolerance_frames() -> u32 {
    45
}

fn default_conversion_min_moves() -> u32 {
    1
}

fn default_combo_min_moves() -> u32 {
    3
}

fn default_combo_min_damage() -> f32 {
    30.0
}

/// Immutable description of one processing run.
///
/// Unknown keys are rejected when deserializing so that a misspelled
/// option fails loudly instead of being silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    /// Directory holding the replay files
    pub root: Utf8PathBuf,

    #[serde(default)]
    pub include_subfolders: bool,

    /// Run the combo detector on every file
    #[serde(default = "default_true")]
    pub find_combos: bool,

    #[serde(default)]
    pub mode: DetectionMode,

    /// Where the combo list is written when detection is enabled
    #[serde(default)]
    pub output_file: Utf8PathBuf,

    #[serde(default)]
    pub delete_if_empty: bool,

    #[serde(default)]
    pub rename_enabled: bool,

    #[serde(default)]
    pub rename_template: String,

    #[serde(default)]
    pub thresholds: DetectionThresholds,
}

fn default_true() -> bool {
    true
}

/// Problems found while validating a [`ProcessConfig`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Nothing to do: enable combo detection or file renaming")]
    NothingToDo,

    #[error("An output file is required when combo detection is enabled")]
    MissingOutputFile,

    #[error("A rename template is required when renaming is enabled")]
    MissingRenameTemplate,

    #[error("Invalid rename template: {0}")]
    InvalidRenameTemplate(#[from] TemplateError),

    #[error("Invalid detection thresholds: {0}")]
    InvalidThresholds(String),
}

impl ProcessConfig {
    /// Create a config that only finds combos in `root` and writes them to `output_file`.
    pub fn new(root: impl Into<Utf8PathBuf>, output_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_subfolders: false,
            find_combos: true,
            mode: DetectionMode::default(),
            output_file: output_file.into(),
            delete_if_empty: false,
            rename_enabled: false,
            rename_template: String::new(),
            thresholds: DetectionThresholds::default(),
        }
    }

    /// Check the invariants a run relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.find_combos && !self.rename_enabled {
            return Err(ConfigError::NothingToDo);
        }

        if self.find_combos && self.output_file.as_str().trim().is_empty() {
            return Err(ConfigError::MissingOutputFile);
        }

        if self.rename_enabled {
            if self.rename_template.trim().is_empty() {
                return Err(ConfigError::MissingRenameTemplate);
            }
            RenameTemplate::parse(&self.rename_template)?;
        }

        let t = &self.thresholds;
        if t.conversion_min_moves == 0 {
            return Err(ConfigError::InvalidThresholds(
                "conversion_min_moves must be at least 1".to_string(),
            ));
        }
        if t.combo_min_moves < t.conversion_min_moves {
            return Err(ConfigError::InvalidThresholds(format!(
                "combo_min_moves ({}) is below conversion_min_moves ({})",
                t.combo_min_moves, t.conversion_min_moves
            )));
        }
        if !t.combo_min_damage.is_finite() || t.combo_min_damage < 0.0 {
            return Err(ConfigError::InvalidThresholds(format!(
                "combo_min_damage must be a non-negative number, got {}",
                t.combo_min_damage
            )));
        }

        Ok(())
    }

    /// Whether files with nothing detected should be removed.
    pub fn deletes_empty_files(&self) -> bool {
        self.find_combos && self.delete_if_empty
    }
}
