//! Error types for the files module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from file state transitions.
#[derive(Debug, Error)]
pub enum FileStateError {
    /// The rename that claims a file failed.
    #[error("Failed to claim {path}")]
    ClaimFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path does not carry the locked suffix.
    #[error("File is not locked: {path}")]
    NotLocked { path: PathBuf },

    /// A file already occupies the name a release would restore.
    #[error("Cannot release {path}: original name is taken")]
    ReleaseConflict { path: PathBuf },

    /// Moving a file failed.
    #[error("Failed to move file from {from} to {to}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to create a directory of the layout.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The naming convention pattern does not compile.
    #[error("Invalid file pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileStateError {
    /// Creates a move failed error.
    pub fn move_failed(from: PathBuf, to: PathBuf, error: std::io::Error) -> Self {
        Self::MoveFailed { from, to, error }
    }

    /// Whether a claim lost to another claimant (the source vanished).
    pub fn is_lost_race(&self) -> bool {
        matches!(
            self,
            Self::ClaimFailed { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_lost_race_only_for_missing_source() {
        let lost = FileStateError::ClaimFailed {
            path: PathBuf::from("cdr_1"),
            source: Error::from(ErrorKind::NotFound),
        };
        assert!(lost.is_lost_race());

        let denied = FileStateError::ClaimFailed {
            path: PathBuf::from("cdr_1"),
            source: Error::from(ErrorKind::PermissionDenied),
        };
        assert!(!denied.is_lost_race());
        assert!(!FileStateError::NotLocked {
            path: PathBuf::from("cdr_1")
        }
        .is_lost_race());
    }
}
