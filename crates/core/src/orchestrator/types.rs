//! Types for the ingest orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::files::FileStats;
use crate::scheduler::SchedulerStatus;

/// Errors that can occur while wiring or driving ingestion.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Configuration was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The storage collaborator failed.
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Directory layout or naming convention problem.
    #[error("file state error: {0}")]
    Files(#[from] crate::files::FileStateError),

    /// A processing cycle failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStatus {
    /// Whether `run_forever` is active.
    pub running: bool,
    /// Whether `initialize` has completed.
    pub initialized: bool,
    /// Size of the user directory loaded at initialization.
    pub known_numbers: usize,
    /// Scheduler state and last cycle, once initialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerStatus>,
    /// Current file counts by state.
    pub files: FileStats,
}
