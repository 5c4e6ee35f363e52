//! Composition root for CDR ingestion.
//!
//! The orchestrator owns the long-lived pieces:
//! - **Store**: provisioned once, supplies the user directory
//! - **Files**: directory layout is created at initialization
//! - **Scheduler**: drives the pipeline until shutdown is requested

mod runner;
mod types;

pub use runner::IngestOrchestrator;
pub use types::{OrchestratorError, OrchestratorStatus};
