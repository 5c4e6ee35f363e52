//! File states and the values the manager hands out.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where a file sits in its lifecycle, read off its name and location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Available,
    Locked,
    Archived,
}

/// A file this process has claimed.
///
/// Only [`FileStateManager::claim`](super::FileStateManager::claim) creates
/// one, so holding a `LockedFile` means the rename happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedFile {
    original: PathBuf,
    locked: PathBuf,
}

impl LockedFile {
    pub(crate) fn new(original: PathBuf, locked: PathBuf) -> Self {
        Self { original, locked }
    }

    /// Path the file had before it was claimed.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Current on-disk path.
    pub fn path(&self) -> &Path {
        &self.locked
    }

    /// Original file name, for logs and archive naming.
    pub fn name(&self) -> String {
        self.original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// How `archive` disposed of a locked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Moved into the archive tree at this path.
    Archived(PathBuf),
    /// The move failed and the file was returned to the source directory.
    Released(PathBuf),
}

/// Point-in-time file counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub pending: usize,
    pub locked: usize,
    pub archived: usize,
    pub source_dir: PathBuf,
    pub archive_dir: PathBuf,
}
