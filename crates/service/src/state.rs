use std::sync::Arc;

use cdr_ingestor_core::{IngestOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    orchestrator: Arc<IngestOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<IngestOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Configuration the orchestrator is running with.
    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(self.orchestrator.config())
    }

    pub fn orchestrator(&self) -> &IngestOrchestrator {
        &self.orchestrator
    }
}
