//! Per-file and per-cycle ingestion.

use futures::stream::{self, StreamExt};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::files::{ArchiveOutcome, FileStateManager, LockedFile};
use crate::metrics;
use crate::record::{
    CallRecord, HeaderMap, RawRow, RecordTransformer, Transformed, WarningKind, IDENTIFIER_COLUMN,
};
use crate::scheduler::ShutdownSignal;
use crate::store::{CallRecordStore, StoreError};

use super::config::PipelineConfig;
use super::types::{CycleSummary, FileDisposition, PipelineError, ProcessingResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Rows parsed off disk, handed from the reader thread to the writer.
#[derive(Debug, Default)]
struct RowBatch {
    rows: Vec<RawRow>,
    malformed: usize,
}

impl RowBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            malformed: 0,
        }
    }

    fn len(&self) -> usize {
        self.rows.len() + self.malformed
    }
}

#[derive(Debug, Default)]
struct FileCounts {
    rows_read: usize,
    persisted: usize,
    rows_failed: usize,
    field_warnings: usize,
}

/// Claims files, streams their rows through the transformer and the store,
/// and decides where each file ends up.
pub struct IngestionPipeline {
    config: PipelineConfig,
    files: Arc<FileStateManager>,
    store: Arc<dyn CallRecordStore>,
    transformer: RecordTransformer,
}

impl IngestionPipeline {
    pub fn new(
        config: PipelineConfig,
        files: Arc<FileStateManager>,
        store: Arc<dyn CallRecordStore>,
        transformer: RecordTransformer,
    ) -> Self {
        Self {
            config,
            files,
            store,
            transformer,
        }
    }

    pub fn files(&self) -> &FileStateManager {
        &self.files
    }

    /// Processes every eligible file once, in order, stopping early only
    /// between files when shutdown is requested.
    pub async fn process_available(
        &self,
        shutdown: &ShutdownSignal,
    ) -> Result<CycleSummary, PipelineError> {
        let started = Instant::now();
        let eligible = self
            .files
            .list_eligible()
            .await
            .map_err(PipelineError::Scan)?;
        let mut summary = CycleSummary::begin(eligible.len());

        for path in eligible {
            if shutdown.is_requested() {
                info!("Shutdown requested, leaving remaining files for the next run");
                summary.interrupted = true;
                break;
            }

            match self.process_file(&path).await {
                Ok(result) => summary.record(result),
                Err(PipelineError::Claim(e)) if e.is_lost_race() => {
                    debug!(file = %path.display(), "File claimed elsewhere, skipping");
                    summary.files_skipped += 1;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to process file");
                    metrics::FILES_PROCESSED
                        .with_label_values(&["claim_failed"])
                        .inc();
                    summary.files_failed += 1;
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            eligible = summary.files_eligible,
            succeeded = summary.files_succeeded,
            failed = summary.files_failed,
            skipped = summary.files_skipped,
            records = summary.records_persisted,
            rows_failed = summary.rows_failed,
            duration_ms = summary.duration_ms,
            "Cycle finished"
        );
        Ok(summary)
    }

    /// Claims and ingests one file.
    ///
    /// Only a failed claim is an error: once the file is locked every outcome
    /// is reported through the returned [`ProcessingResult`].
    pub async fn process_file(&self, path: &Path) -> Result<ProcessingResult, PipelineError> {
        let started = Instant::now();
        let locked = self.files.claim(path).await.map_err(PipelineError::Claim)?;
        let name = locked.name();

        let mut counts = FileCounts::default();
        let ingest_error = match self.ingest(&locked, &mut counts).await {
            Ok(()) => None,
            Err(e) => {
                warn!(file = %name, error = %e, "File ingestion stopped early");
                Some(e.to_string())
            }
        };

        let (disposition, dispose_error) = self
            .dispose(&locked, counts.persisted, ingest_error.is_some())
            .await;
        metrics::FILES_PROCESSED
            .with_label_values(&[disposition.label()])
            .inc();

        let success = matches!(disposition, FileDisposition::Archived { .. });
        let error = ingest_error.or(dispose_error);
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(
            file = %name,
            rows = counts.rows_read,
            records = counts.persisted,
            rows_failed = counts.rows_failed,
            warnings = counts.field_warnings,
            disposition = disposition.label(),
            duration_ms,
            "File processed"
        );

        Ok(ProcessingResult {
            file: path.to_path_buf(),
            success,
            records_persisted: counts.persisted,
            rows_failed: counts.rows_failed,
            field_warnings: counts.field_warnings,
            disposition,
            duration_ms,
            error,
        })
    }

    async fn ingest(&self, file: &LockedFile, counts: &mut FileCounts) -> Result<(), PipelineError> {
        let (tx, mut rx) = mpsc::channel(1);
        let path = file.path().to_path_buf();
        let batch_size = self.config.batch_size.max(1);
        let reader = tokio::task::spawn_blocking(move || read_batches(&path, batch_size, &tx));

        let name = file.name();
        while let Some(message) = rx.recv().await {
            let batch: RowBatch = message?;
            if batch.malformed > 0 {
                counts.rows_failed += batch.malformed;
                metrics::ROW_FAILURES
                    .with_label_values(&["parse"])
                    .inc_by(batch.malformed as u64);
            }

            let records = self.transform_batch(&name, batch.rows, counts);
            self.write_batch(&name, records, counts)
                .await
                .map_err(PipelineError::Storage)?;
        }

        reader
            .await
            .map_err(|e| PipelineError::Read(format!("reader task failed: {e}")))
    }

    fn transform_batch(
        &self,
        file: &str,
        rows: Vec<RawRow>,
        counts: &mut FileCounts,
    ) -> Vec<CallRecord> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            counts.rows_read += 1;
            if RecordTransformer::is_type_descriptor(&row) {
                debug!(file, row = counts.rows_read, "Skipping column type row");
                continue;
            }

            match self.transformer.transform(&row) {
                Ok(Transformed { record, warnings }) => {
                    for w in &warnings {
                        if w.kind == WarningKind::AddressUnset {
                            debug!(file, pk_id = %record.pk_id, column = w.column, "Address unset");
                        } else {
                            warn!(
                                file,
                                pk_id = %record.pk_id,
                                column = w.column,
                                value = %w.value,
                                kind = w.kind.as_str(),
                                "Field value dropped"
                            );
                        }
                    }
                    counts.field_warnings += warnings.len();
                    metrics::FIELD_WARNINGS.inc_by(warnings.len() as u64);
                    records.push(record);
                }
                Err(e) => {
                    error!(file, row = counts.rows_read, error = %e, "Row skipped");
                    counts.rows_failed += 1;
                    metrics::ROW_FAILURES.with_label_values(&["transform"]).inc();
                }
            }
        }
        records
    }

    /// Inserts a batch with bounded concurrency. Fails only when every insert
    /// failed transiently, which means the store is down.
    async fn write_batch(
        &self,
        file: &str,
        records: Vec<CallRecord>,
        counts: &mut FileCounts,
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let attempted = records.len();
        let timeout = self.config.write_timeout();
        let timeout_ms = self.config.write_timeout_ms;
        let store = &self.store;

        let outcomes: Vec<(String, Result<_, StoreError>)> = stream::iter(records)
            .map(|record| async move {
                let result = match tokio::time::timeout(timeout, store.insert(&record)).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::timeout("insert", timeout_ms)),
                };
                (record.pk_id, result)
            })
            .buffer_unordered(self.config.write_concurrency.max(1))
            .collect()
            .await;

        let mut transient = 0;
        let mut last_error = None;
        for (pk_id, result) in outcomes {
            match result {
                Ok(_) => {
                    counts.persisted += 1;
                    metrics::RECORDS_PERSISTED.inc();
                }
                Err(e) => {
                    error!(file, pk_id = %pk_id, error = %e, "Failed to persist record");
                    counts.rows_failed += 1;
                    metrics::ROW_FAILURES.with_label_values(&["persist"]).inc();
                    if e.is_transient() {
                        transient += 1;
                    }
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if transient == attempted => Err(e),
            _ => Ok(()),
        }
    }

    /// Archives a fully read file that produced records. A file whose
    /// ingestion stopped early goes back to the source directory so the
    /// unread rows are retried.
    async fn dispose(
        &self,
        file: &LockedFile,
        persisted: usize,
        stopped_early: bool,
    ) -> (FileDisposition, Option<String>) {
        if persisted > 0 && !stopped_early {
            match self.files.archive(file, persisted).await {
                Ok(ArchiveOutcome::Archived(path)) => (FileDisposition::Archived { path }, None),
                Ok(ArchiveOutcome::Released(_)) => (
                    FileDisposition::Released,
                    Some("archive failed, file released".to_string()),
                ),
                Err(e) => {
                    error!(file = %file.name(), error = %e, "File left locked");
                    (FileDisposition::StillLocked, Some(e.to_string()))
                }
            }
        } else {
            if stopped_early && persisted > 0 {
                warn!(
                    file = %file.name(),
                    persisted,
                    "Releasing partially ingested file, persisted rows will repeat"
                );
            }
            match self.files.release(file).await {
                Ok(_) => (
                    FileDisposition::Released,
                    Some("no records persisted".to_string()),
                ),
                Err(e) => {
                    error!(file = %file.name(), error = %e, "File left locked");
                    (FileDisposition::StillLocked, Some(e.to_string()))
                }
            }
        }
    }
}

/// Reader thread body: parses the file and sends batches until done or the
/// receiver goes away.
fn read_batches(
    path: &Path,
    batch_size: usize,
    tx: &mpsc::Sender<Result<RowBatch, PipelineError>>,
) {
    if let Err(e) = stream_rows(path, batch_size, tx) {
        let _ = tx.blocking_send(Err(e));
    }
}

fn stream_rows(
    path: &Path,
    batch_size: usize,
    tx: &mpsc::Sender<Result<RowBatch, PipelineError>>,
) -> Result<(), PipelineError> {
    let read_error = |e: &dyn std::fmt::Display| {
        PipelineError::Read(format!("{}: {}", path.display(), e))
    };

    let file = std::fs::File::open(path).map_err(|e| read_error(&e))?;
    let mut input = BufReader::new(file);
    if input.fill_buf().map_err(|e| read_error(&e))?.starts_with(UTF8_BOM) {
        input.consume(UTF8_BOM.len());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(input);

    let header = HeaderMap::new(reader.headers().map_err(|e| read_error(&e))?.iter());
    if !header.has(IDENTIFIER_COLUMN) {
        return Err(read_error(&format!(
            "header has no {IDENTIFIER_COLUMN} column"
        )));
    }

    let mut batch = RowBatch::with_capacity(batch_size);
    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => batch.rows.push(header.row(record.iter())),
            Ok(false) => break,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                warn!(file = %path.display(), error = %e, "Malformed row skipped");
                batch.malformed += 1;
            }
            Err(e) => return Err(read_error(&e)),
        }

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, RowBatch::with_capacity(batch_size));
            if tx.blocking_send(Ok(full)).is_err() {
                return Ok(());
            }
        }
    }

    if batch.len() > 0 {
        let _ = tx.blocking_send(Ok(batch));
    }
    Ok(())
}
