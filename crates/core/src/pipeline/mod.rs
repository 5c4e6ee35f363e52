//! Ingestion pipeline: claim, parse, transform, persist, dispose.
//!
//! Files are processed one at a time. Within a file, rows are read on a
//! blocking thread and handed over in batches of `batch_size`; a batch is
//! written with bounded concurrency and the next batch is not written until
//! the previous one has finished. Batches bound memory only and are not
//! transactions.

mod config;
mod ingest;
mod types;

pub use config::PipelineConfig;
pub use ingest::IngestionPipeline;
pub use types::{CycleSummary, FileDisposition, PipelineError, ProcessingResult};
