//! Result file output.
//!
//! The combo file is a JSON array with one record per replay that had at
//! least one detected sequence:
//!
//! ```json
//! [
//!   {
//!     "source": "/replays/game.slp",
//!     "path": "/replays/game_combo2.slp",
//!     "sequences": [
//!       { "player_index": 0, "opponent_index": 1, "start_frame": 120, "end_frame": 245,
//!         "moves": 4, "damage": 48.0, "start_percent": 0.0, "end_percent": 48.0,
//!         "did_kill": false, "grade": "combo" }
//!     ]
//!   }
//! ]
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use thiserror::Error;

use crate::models::{DetectedSequence, FileOutcome, SequenceGrade};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write results to {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results for {path}: {source}")]
    Serialize {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One detected sequence as stored in the result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub player_index: u8,
    pub opponent_index: u8,
    pub start_frame: i32,
    pub end_frame: i32,
    pub moves: u32,
    pub damage: f32,
    pub start_percent: f32,
    pub end_percent: f32,
    pub did_kill: bool,
    pub grade: SequenceGrade,
}

impl From<&DetectedSequence> for SequenceRecord {
    fn from(seq: &DetectedSequence) -> Self {
        Self {
            player_index: seq.player_index,
            opponent_index: seq.opponent_index,
            start_frame: seq.start_frame,
            end_frame: seq.end_frame,
            moves: seq.moves,
            damage: seq.damage(),
            start_percent: seq.start_percent,
            end_percent: seq.end_percent,
            did_kill: seq.did_kill,
            grade: seq.grade,
        }
    }
}

/// All sequences found in one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Path the replay had when the run started
    pub source: Utf8PathBuf,

    /// Path of the replay after any rename
    pub path: Utf8PathBuf,

    pub sequences: Vec<SequenceRecord>,
}

impl ResultRecord {
    /// Build records for every outcome that still exists and has sequences.
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Vec<ResultRecord> {
        outcomes
            .iter()
            .filter(|o| !o.sequences.is_empty())
            .filter_map(|o| {
                let path = o.current_path()?.to_path_buf();
                Some(ResultRecord {
                    source: o.path.clone(),
                    path,
                    sequences: o.sequences.iter().map(SequenceRecord::from).collect(),
                })
            })
            .collect()
    }
}

/// Persists the aggregate of a run.
pub trait ResultWriter: Send + Sync {
    fn write(&self, records: &[ResultRecord], path: &Utf8Path) -> Result<(), WriteError>;
}

/// Writes results as pretty-printed JSON, replacing any existing file.
#[derive(Debug, Clone, Default)]
pub struct JsonResultWriter;

impl JsonResultWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ResultWriter for JsonResultWriter {
    fn write(&self, records: &[ResultRecord], path: &Utf8Path) -> Result<(), WriteError> {
        let io_err = |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, records).map_err(|source| {
            WriteError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;

        tracing::info!(
            "Wrote {} sequences from {} files to {}",
            records.iter().map(|r| r.sequences.len()).sum::<usize>(),
            records.len(),
            path
        );
        Ok(())
    }
}

/// Read a result file back.
pub fn read_results(path: &Utf8Path) -> Result<Vec<ResultRecord>, WriteError> {
    let file = File::open(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| WriteError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}
