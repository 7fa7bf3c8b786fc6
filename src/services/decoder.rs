use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

use crate::models::GameReplay;

/// Default extension of replay recordings.
pub const REPLAY_EXTENSION: &str = "slp";

/// Errors raised while turning a file into a [`GameReplay`]
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read replay {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse replay {path}: {message}")]
    Parse { path: Utf8PathBuf, message: String },

    #[error("Malformed replay: {0}")]
    Malformed(String),
}

/// Adapter over whatever library understands the replay format.
///
/// Implementations must be shareable across threads: the processor runs each
/// decode on tokio's blocking pool.
#[cfg_attr(test, mockall::automock)]
pub trait ReplayDecoder: Send + Sync {
    fn decode(&self, path: &Utf8Path) -> Result<GameReplay, DecodeError>;

    /// Extension (without the dot) of the files this decoder reads
    fn file_extension(&self) -> &'static str {
        REPLAY_EXTENSION
    }
}

/// Decoder for replays stored as serialized [`GameReplay`] documents.
#[derive(Debug, Clone, Default)]
pub struct JsonReplayDecoder;

impl JsonReplayDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ReplayDecoder for JsonReplayDecoder {
    fn decode(&self, path: &Utf8Path) -> Result<GameReplay, DecodeError> {
        let bytes = fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let replay: GameReplay =
            serde_json::from_slice(&bytes).map_err(|e| DecodeError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Decoded {}: {} players, {} events",
            path,
            replay.metadata.players.len(),
            replay.events.len()
        );

        Ok(replay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_decode_document() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"metadata": {{"stage": "Yoshi's Story", "players": [{{"index": 0, "character": "Fox"}}]}}, "events": []}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let replay = JsonReplayDecoder::new().decode(&path).unwrap();
        assert_eq!(replay.metadata.stage.as_deref(), Some("Yoshi's Story"));
        assert!(replay.events.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        // events missing "percent"
        write!(
            file,
            r#"{{"metadata": {{"players": []}}, "events": [{{"frame": 0, "player_index": 0, "action_state": 14, "stocks_remaining": 4}}]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        let err = JsonReplayDecoder::new().decode(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = JsonReplayDecoder::new()
            .decode(Utf8Path::new("/definitely/not/here.slp"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    #[test]
    fn test_default_extension() {
        assert_eq!(JsonReplayDecoder::new().file_extension(), "slp");
    }
}
