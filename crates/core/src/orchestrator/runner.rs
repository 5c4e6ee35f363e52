//! Ingest orchestrator implementation.
//!
//! Wires the store, the file state manager, the transformer and the pipeline
//! together, then hands the pipeline to the scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{validate_config, Config};
use crate::files::FileStateManager;
use crate::pipeline::{CycleSummary, IngestionPipeline, PipelineError};
use crate::record::RecordTransformer;
use crate::scheduler::{Scheduler, ShutdownSignal};
use crate::store::{CallRecordStore, SqliteCallRecordStore};

use super::types::{OrchestratorError, OrchestratorStatus};

/// Components built by `initialize`.
struct Wiring {
    scheduler: Arc<Scheduler>,
    known_numbers: usize,
}

/// Composition root for the ingestion service.
pub struct IngestOrchestrator {
    config: Config,
    store: Arc<dyn CallRecordStore>,
    files: Arc<FileStateManager>,
    wiring: RwLock<Option<Wiring>>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown: ShutdownSignal,
}

impl IngestOrchestrator {
    /// Create an orchestrator over an existing store.
    pub fn new(config: Config, store: Arc<dyn CallRecordStore>) -> Result<Self, OrchestratorError> {
        validate_config(&config)?;
        let files = FileStateManager::new(config.files.clone())?;

        Ok(Self {
            config,
            store,
            files: Arc::new(files),
            wiring: RwLock::new(None),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Create an orchestrator backed by the SQLite store named in `config`.
    pub fn from_config(config: Config) -> Result<Self, OrchestratorError> {
        let store = SqliteCallRecordStore::from_config(&config.storage)?;
        Self::new(config, Arc::new(store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn files(&self) -> &FileStateManager {
        &self.files
    }

    /// Handle that stops `run_forever` when requested.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Provisions storage, loads the user directory, prepares the directory
    /// layout and builds the pipeline. Calling it again reloads the
    /// directory.
    pub async fn initialize(&self) -> Result<(), OrchestratorError> {
        info!(store = self.store.name(), "Initializing ingest orchestrator");

        self.store.provision().await?;
        let directory = self.store.known_phone_numbers().await?;
        if directory.is_empty() {
            warn!("User directory is empty, every call will classify as external");
        }
        let known_numbers = directory.len();

        self.files.ensure_layout().await?;

        let pipeline = IngestionPipeline::new(
            self.config.pipeline.clone(),
            Arc::clone(&self.files),
            Arc::clone(&self.store),
            RecordTransformer::new(Arc::new(directory)),
        );
        let scheduler = Scheduler::new(
            &self.config.scheduler,
            Arc::new(pipeline),
            self.shutdown.clone(),
        );

        *self.wiring.write().await = Some(Wiring {
            scheduler: Arc::new(scheduler),
            known_numbers,
        });

        let stats = self.files.stats().await;
        info!(
            known_numbers,
            pending = stats.pending,
            locked = stats.locked,
            archived = stats.archived,
            source_dir = %stats.source_dir.display(),
            archive_dir = %stats.archive_dir.display(),
            "Ingest orchestrator initialized"
        );
        Ok(())
    }

    async fn scheduler(&self) -> Result<Arc<Scheduler>, OrchestratorError> {
        self.wiring
            .read()
            .await
            .as_ref()
            .map(|w| Arc::clone(&w.scheduler))
            .ok_or(OrchestratorError::Pipeline(PipelineError::NotInitialized))
    }

    /// Runs a single processing cycle.
    pub async fn process_available(&self) -> Result<CycleSummary, OrchestratorError> {
        let scheduler = self.scheduler().await?;
        Ok(scheduler.run_cycle().await?)
    }

    /// Runs cycles until shutdown is requested.
    pub async fn run_forever(&self) -> Result<(), OrchestratorError> {
        let scheduler = self.scheduler().await?;

        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return Ok(());
        }

        scheduler.run().await;

        self.running.store(false, Ordering::SeqCst);
        info!("Ingest orchestrator stopped");
        Ok(())
    }

    /// Asks the scheduler to stop after the file in flight.
    pub fn request_shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.request();
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let (scheduler, known_numbers) = match self.wiring.read().await.as_ref() {
            Some(w) => (Some(Arc::clone(&w.scheduler)), w.known_numbers),
            None => (None, 0),
        };
        let scheduler_status = match scheduler {
            Some(s) => Some(s.status().await),
            None => None,
        };

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            initialized: scheduler_status.is_some(),
            known_numbers,
            scheduler: scheduler_status,
            files: self.files.stats().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FilesConfig;
    use crate::record::CallDirection;
    use crate::scheduler::SchedulerState;
    use crate::testing::fixtures::{cdr_csv, cdr_row, write_stale_file};
    use crate::testing::MockCallRecordStore;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, Arc<MockCallRecordStore>, IngestOrchestrator) {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in");
        let archive = temp.path().join("archive");

        let config = Config {
            files: FilesConfig::with_dirs(&source, &archive),
            ..Config::default()
        };
        let store = Arc::new(MockCallRecordStore::new());
        let orchestrator =
            IngestOrchestrator::new(config, store.clone() as Arc<dyn CallRecordStore>).unwrap();
        (temp, source, store, orchestrator)
    }

    #[tokio::test]
    async fn test_process_before_initialize_fails() {
        let (_temp, _source, _store, orchestrator) = setup();
        let err = orchestrator.process_available().await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Pipeline(PipelineError::NotInitialized)
        ));
        assert!(orchestrator.run_forever().await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_provisions_and_creates_layout() {
        let (_temp, source, store, orchestrator) = setup();
        store.set_known_numbers(["1001", "1002"]).await;

        orchestrator.initialize().await.unwrap();

        assert_eq!(store.provision_count(), 1);
        assert!(source.is_dir());
        let status = orchestrator.status().await;
        assert!(status.initialized);
        assert!(!status.running);
        assert_eq!(status.known_numbers, 2);
        assert_eq!(
            status.scheduler.map(|s| s.state),
            Some(SchedulerState::Idle)
        );
    }

    #[tokio::test]
    async fn test_process_available_classifies_with_directory() {
        let (_temp, source, store, orchestrator) = setup();
        store.set_known_numbers(["1001", "1002"]).await;
        orchestrator.initialize().await.unwrap();

        write_stale_file(
            &source.join("cdr_a"),
            &cdr_csv(&[
                cdr_row("pk-1", "1001", "1002"),
                cdr_row("pk-2", "1001", "905551112233"),
            ]),
        );

        let summary = orchestrator.process_available().await.unwrap();
        assert_eq!(summary.records_persisted, 2);

        let records = store.inserted_records().await;
        let internal = records.iter().find(|r| r.pk_id == "pk-1").unwrap();
        let outgoing = records.iter().find(|r| r.pk_id == "pk-2").unwrap();
        assert_eq!(internal.call_direction, Some(CallDirection::Internal));
        assert_eq!(outgoing.call_direction, Some(CallDirection::Outgoing));

        let status = orchestrator.status().await;
        assert_eq!(status.files.archived, 1);
        assert_eq!(status.scheduler.unwrap().cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_request() {
        let (_temp, _source, _store, orchestrator) = setup();
        orchestrator.initialize().await.unwrap();
        let orchestrator = Arc::new(orchestrator);

        let runner = Arc::clone(&orchestrator);
        let handle = tokio::spawn(async move { runner.run_forever().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(orchestrator.status().await.running);
        orchestrator.request_shutdown();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let status = orchestrator.status().await;
        assert!(!status.running);
        assert_eq!(
            status.scheduler.map(|s| s.state),
            Some(SchedulerState::Stopped)
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.pipeline.batch_size = 0;
        let result = IngestOrchestrator::new(config, Arc::new(MockCallRecordStore::new()));
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }
}
