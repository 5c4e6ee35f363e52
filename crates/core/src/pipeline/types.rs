//! Types for the pipeline module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::files::FileStateError;
use crate::store::StoreError;

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline has not been built yet.
    #[error("Pipeline is not initialized")]
    NotInitialized,

    /// Listing the source directory failed.
    #[error("Failed to scan source directory: {0}")]
    Scan(#[source] FileStateError),

    /// Claiming a file failed.
    #[error("Failed to claim file: {0}")]
    Claim(#[source] FileStateError),

    /// The file could not be read as delimited text.
    #[error("Failed to read file: {0}")]
    Read(String),

    /// Every write in a batch failed transiently.
    #[error("Storage unavailable: {0}")]
    Storage(#[source] StoreError),
}

/// What happened to a file at the end of processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileDisposition {
    /// Moved into the archive at this path.
    Archived { path: PathBuf },
    /// Returned to the source directory for the next cycle.
    Released,
    /// Neither archive nor release succeeded; needs an operator.
    StillLocked,
}

impl FileDisposition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Archived { .. } => "archived",
            Self::Released => "released",
            Self::StillLocked => "locked",
        }
    }
}

/// Outcome of processing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub file: PathBuf,
    pub success: bool,
    pub records_persisted: usize,
    pub rows_failed: usize,
    pub field_warnings: usize,
    pub disposition: FileDisposition,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of one `process_available` pass.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Files that passed the readiness test this cycle.
    pub files_eligible: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    /// Files another claimant took first.
    pub files_skipped: usize,
    pub records_persisted: usize,
    pub rows_failed: usize,
    /// Shutdown was requested before every eligible file was processed.
    pub interrupted: bool,
    pub results: Vec<ProcessingResult>,
}

impl CycleSummary {
    pub(crate) fn begin(files_eligible: usize) -> Self {
        Self {
            started_at: Utc::now(),
            duration_ms: 0,
            files_eligible,
            files_succeeded: 0,
            files_failed: 0,
            files_skipped: 0,
            records_persisted: 0,
            rows_failed: 0,
            interrupted: false,
            results: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, result: ProcessingResult) {
        if result.success {
            self.files_succeeded += 1;
        } else {
            self.files_failed += 1;
        }
        self.records_persisted += result.records_persisted;
        self.rows_failed += result.rows_failed;
        self.results.push(result);
    }

    /// Files processed (succeeded or failed) this cycle.
    pub fn files_processed(&self) -> usize {
        self.files_succeeded + self.files_failed
    }
}
