//! Per-file rename/delete decisions and their application on disk.
//!
//! Rules, in order:
//! 1. detection enabled, `delete_if_empty` set and nothing detected → [`FileAction::Delete`]
//! 2. renaming enabled → [`FileAction::Rename`] to the rendered template, made unique
//! 3. otherwise → [`FileAction::None`]
//!
//! Files whose analysis failed are never touched.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use std::fs;
use thiserror::Error;

use super::template::{RenameTemplate, TemplateContext, TemplateError};
use crate::models::{FileOutcome, ProcessConfig, ReplayMetadata};

/// Highest numeric suffix tried before giving up on a unique name.
pub const MAX_COLLISION_SUFFIX: u32 = 999;

/// What to do with a processed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    None,
    Rename(Utf8PathBuf),
    Delete,
}

/// Errors raised while resolving or applying a file action
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name for {0} after {max} attempts", max = MAX_COLLISION_SUFFIX)]
    CollisionExhausted(Utf8PathBuf),

    #[error("Cannot derive a new name for {0}")]
    InvalidTarget(Utf8PathBuf),

    #[error("Rename template error: {0}")]
    Template(#[from] TemplateError),
}

/// Per-file values the rename template can draw on.
#[derive(Debug, Clone, Copy)]
pub struct RenameContext<'a> {
    /// 1-based position of the file in the run
    pub index: usize,

    /// Metadata of the decoded replay
    pub metadata: Option<&'a ReplayMetadata>,
}

/// Decides what happens to each file after analysis.
#[derive(Debug, Clone)]
pub struct FileActionResolver {
    template: Option<RenameTemplate>,
}

impl FileActionResolver {
    /// Build a resolver for a run, parsing the rename template once.
    pub fn for_config(config: &ProcessConfig) -> Result<Self, TemplateError> {
        let template = if config.rename_enabled {
            Some(RenameTemplate::parse(&config.rename_template)?)
        } else {
            None
        };
        Ok(Self { template })
    }

    pub fn resolve(
        &self,
        outcome: &FileOutcome,
        config: &ProcessConfig,
        ctx: &RenameContext<'_>,
    ) -> Result<FileAction, ActionError> {
        if outcome.error.is_some() {
            return Ok(FileAction::None);
        }

        if config.deletes_empty_files() && outcome.sequences.is_empty() {
            return Ok(FileAction::Delete);
        }

        let Some(template) = self.template.as_ref().filter(|_| config.rename_enabled) else {
            return Ok(FileAction::None);
        };

        let path = &outcome.path;
        let (Some(dir), Some(stem)) = (path.parent(), path.file_stem()) else {
            return Err(ActionError::InvalidTarget(path.clone()));
        };

        let started_at = match ctx.metadata.and_then(|m| m.started_at) {
            Some(at) => at,
            None => modified_time(path),
        };
        let players: Vec<&str> = ctx
            .metadata
            .map(|m| m.players.iter().map(|p| p.display_name()).collect())
            .unwrap_or_default();

        let template_ctx = TemplateContext {
            stem,
            count: outcome.sequence_count(),
            index: ctx.index,
            started_at,
            stage: ctx.metadata.and_then(|m| m.stage.as_deref()),
            players,
            mode: config.mode.noun(),
        };

        let new_stem = template.render(&template_ctx);
        let target = unique_path(path, dir, &new_stem, path.extension())?;

        match target {
            Some(target) => Ok(FileAction::Rename(target)),
            None => Ok(FileAction::None),
        }
    }
}

/// Result of [`apply`], folded into the file's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliedAction {
    pub new_path: Option<Utf8PathBuf>,
    pub deleted: bool,
}

/// Perform `action` on `path`.
pub fn apply(action: &FileAction, path: &Utf8Path) -> Result<AppliedAction, ActionError> {
    match action {
        FileAction::None => Ok(AppliedAction::default()),
        FileAction::Rename(target) => {
            if target.exists() {
                return Err(ActionError::Io {
                    operation: "rename",
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!("{} already exists", target),
                    ),
                });
            }
            fs::rename(path, target).map_err(|source| ActionError::Io {
                operation: "rename",
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("Renamed {} to {}", path, target);
            Ok(AppliedAction {
                new_path: Some(target.clone()),
                deleted: false,
            })
        }
        FileAction::Delete => {
            fs::remove_file(path).map_err(|source| ActionError::Io {
                operation: "delete",
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("Deleted {}", path);
            Ok(AppliedAction {
                new_path: None,
                deleted: true,
            })
        }
    }
}

/// Find a free path for `stem` in `dir`, appending `_1`, `_2`… on collision.
///
/// Returns `None` when the rendered name is the file's current name.
fn unique_path(
    current: &Utf8Path,
    dir: &Utf8Path,
    stem: &str,
    extension: Option<&str>,
) -> Result<Option<Utf8PathBuf>, ActionError> {
    let file_name = |suffix: Option<u32>| {
        let mut name = match suffix {
            Some(n) => format!("{}_{}", stem, n),
            None => stem.to_string(),
        };
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(ext);
        }
        dir.join(name)
    };

    let candidate = file_name(None);
    if candidate.as_path() == current {
        return Ok(None);
    }
    if !candidate.exists() {
        return Ok(Some(candidate));
    }

    for n in 1..=MAX_COLLISION_SUFFIX {
        let candidate = file_name(Some(n));
        if candidate.as_path() == current {
            return Ok(None);
        }
        if !candidate.exists() {
            return Ok(Some(candidate));
        }
    }

    Err(ActionError::CollisionExhausted(file_name(None)))
}

fn modified_time(path: &Utf8Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|e| {
            tracing::debug!("No modification time for {}: {}", path, e);
            Utc::now()
        })
}
