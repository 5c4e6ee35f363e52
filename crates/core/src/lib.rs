pub mod config;
pub mod files;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, HttpConfig, SanitizedConfig,
};
pub use files::{
    ArchiveOutcome, FileState, FileStateError, FileStateManager, FileStats, FilesConfig,
    LockedFile,
};
pub use orchestrator::{IngestOrchestrator, OrchestratorError, OrchestratorStatus};
pub use pipeline::{
    CycleSummary, FileDisposition, IngestionPipeline, PipelineConfig, PipelineError,
    ProcessingResult,
};
pub use record::{
    CallDirection, CallRecord, FieldWarning, RawRow, RecordTransformer, TransformError,
    Transformed, UserDirectory, WarningKind,
};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, SchedulerStatus, ShutdownSignal};
pub use store::{
    CallRecordStore, SqliteCallRecordStore, StorageConfig, StoreError, StoredDocumentId,
};
