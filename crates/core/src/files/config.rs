//! Configuration for the file state manager.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where CDR files arrive, how they are recognized and when they are ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Directory the producer drops files into.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Root of the `YYYY/MM` archive tree.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Regular expression a file name must match to be ingested.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Suffix appended to a file name while it is claimed.
    #[serde(default = "default_locked_suffix")]
    pub locked_suffix: String,

    /// Files smaller than this are assumed to still be in creation.
    #[serde(default = "default_min_file_size")]
    pub min_file_size_bytes: u64,

    /// Minimum age of the last modification before a file is ready.
    #[serde(default = "default_stability_window")]
    pub stability_window_secs: u64,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("data/cdr")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("data/cdr_processed")
}

fn default_file_pattern() -> String {
    "^cdr_".to_string()
}

fn default_locked_suffix() -> String {
    ".processing".to_string()
}

fn default_min_file_size() -> u64 {
    100
}

fn default_stability_window() -> u64 {
    60
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            archive_dir: default_archive_dir(),
            file_pattern: default_file_pattern(),
            locked_suffix: default_locked_suffix(),
            min_file_size_bytes: default_min_file_size(),
            stability_window_secs: default_stability_window(),
        }
    }
}

impl FilesConfig {
    /// Config rooted at the given directories, other values default.
    pub fn with_dirs(source_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            archive_dir: archive_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_stability_window(mut self, secs: u64) -> Self {
        self.stability_window_secs = secs;
        self
    }

    pub fn with_min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size_bytes = bytes;
        self
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_secs(self.stability_window_secs)
    }
}
