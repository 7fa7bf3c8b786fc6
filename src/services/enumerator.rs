//! Replay file discovery.
//!
//! [`enumerate`] checks the root once and returns a [`ReplayScan`]. Every call to
//! [`ReplayScan::iter`] starts a fresh, lazy directory walk, so the scan can be
//! restarted and never holds the whole tree in memory.
//!
//! Symlinks to files are yielded as replays; renames and deletes then act on
//! the link, not its target. Symlinked directories are not descended into.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised before any file is visited
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Replay directory not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("Replay path is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),
}

/// A validated, restartable scan over replay files under a root directory.
#[derive(Debug, Clone)]
pub struct ReplayScan {
    root: Utf8PathBuf,
    recurse: bool,
    extension: String,
}

/// Start a scan of `root` for files with the given extension.
///
/// When `recurse` is false only direct children of `root` are yielded.
pub fn enumerate(root: &Utf8Path, recurse: bool, extension: &str) -> Result<ReplayScan, ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    Ok(ReplayScan {
        root: root.to_path_buf(),
        recurse,
        extension: extension.trim_start_matches('.').to_ascii_lowercase(),
    })
}

impl ReplayScan {
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Walk the tree. Entries within a directory are visited in file-name order,
    /// and a directory's own files come before the contents of its subdirectories.
    pub fn iter(&self) -> impl Iterator<Item = Utf8PathBuf> + '_ {
        let max_depth = if self.recurse { usize::MAX } else { 1 };

        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by(|a, b| {
                // Files first, then directories, each group by name
                let a_dir = a.file_type().is_dir();
                let b_dir = b.file_type().is_dir();
                a_dir.cmp(&b_dir).then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", self.root, e);
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
            })
            .filter_map(|entry| match Utf8PathBuf::try_from(entry.into_path()) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping non UTF-8 path: {}", e.as_path().display());
                    None
                }
            })
            .filter(|path| self.matches_extension(path))
    }

    fn matches_extension(&self, path: &Utf8Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}
