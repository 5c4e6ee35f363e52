//! Mock call record store for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::record::{CallRecord, UserDirectory};
use crate::store::{CallRecordStore, StoreError, StoredDocumentId};

/// Mock implementation of the CallRecordStore trait.
///
/// Provides controllable behavior for testing:
/// - Records every inserted document for assertions
/// - Fails inserts for chosen pk_ids or call positions
/// - Simulates slow writes
/// - Serves a configurable set of known numbers
///
/// # Example
///
/// ```rust,ignore
/// use cdr_ingestor_core::testing::MockCallRecordStore;
///
/// let store = MockCallRecordStore::new();
/// store.fail_pk_id("pk-2").await;
///
/// // Run the pipeline against it...
///
/// assert_eq!(store.inserted_count().await, 2);
/// ```
#[derive(Debug)]
pub struct MockCallRecordStore {
    /// Documents accepted so far.
    inserted: Arc<RwLock<Vec<CallRecord>>>,
    /// pk_ids whose insert fails.
    failing_pk_ids: Arc<RwLock<HashSet<String>>>,
    /// Zero-based insert call positions that fail.
    failing_calls: Arc<RwLock<HashSet<usize>>>,
    /// Insert call position from which the store reports itself unavailable.
    unavailable_from: Arc<RwLock<Option<usize>>>,
    /// Simulated write latency.
    latency: Arc<RwLock<Duration>>,
    /// Numbers returned by `known_phone_numbers`.
    known_numbers: Arc<RwLock<Vec<String>>>,
    insert_calls: AtomicUsize,
    provision_calls: AtomicUsize,
}

impl Default for MockCallRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCallRecordStore {
    /// Create a new mock store that accepts everything.
    pub fn new() -> Self {
        Self {
            inserted: Arc::new(RwLock::new(Vec::new())),
            failing_pk_ids: Arc::new(RwLock::new(HashSet::new())),
            failing_calls: Arc::new(RwLock::new(HashSet::new())),
            unavailable_from: Arc::new(RwLock::new(None)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            known_numbers: Arc::new(RwLock::new(Vec::new())),
            insert_calls: AtomicUsize::new(0),
            provision_calls: AtomicUsize::new(0),
        }
    }

    /// Make inserts of the record with this pk_id fail.
    pub async fn fail_pk_id(&self, pk_id: &str) {
        self.failing_pk_ids.write().await.insert(pk_id.to_string());
    }

    /// Make the n-th insert call (zero-based) fail.
    pub async fn fail_call_index(&self, index: usize) {
        self.failing_calls.write().await.insert(index);
    }

    /// Simulate an outage: the n-th insert call (zero-based) and every later
    /// one fail with [`StoreError::Unavailable`].
    pub async fn unavailable_from(&self, index: usize) {
        *self.unavailable_from.write().await = Some(index);
    }

    /// Delay every insert by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    pub async fn set_known_numbers<I, S>(&self, numbers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.known_numbers.write().await = numbers.into_iter().map(Into::into).collect();
    }

    pub async fn inserted_count(&self) -> usize {
        self.inserted.read().await.len()
    }

    /// pk_ids of accepted documents, in completion order.
    pub async fn inserted_pk_ids(&self) -> Vec<String> {
        self.inserted
            .read()
            .await
            .iter()
            .map(|r| r.pk_id.clone())
            .collect()
    }

    pub async fn inserted_records(&self) -> Vec<CallRecord> {
        self.inserted.read().await.clone()
    }

    /// Number of insert calls made, including failed ones.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn provision_count(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallRecordStore for MockCallRecordStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn provision(&self) -> Result<(), StoreError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(&self, record: &CallRecord) -> Result<StoredDocumentId, StoreError> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if matches!(*self.unavailable_from.read().await, Some(from) if call >= from) {
            return Err(StoreError::Unavailable("mock store down".to_string()));
        }

        if self.failing_calls.read().await.contains(&call)
            || self.failing_pk_ids.read().await.contains(&record.pk_id)
        {
            return Err(StoreError::Database(format!(
                "mock insert failure for {}",
                record.pk_id
            )));
        }

        self.inserted.write().await.push(record.clone());
        Ok(StoredDocumentId(format!("mock-{call}")))
    }

    async fn known_phone_numbers(&self) -> Result<UserDirectory, StoreError> {
        let numbers = self.known_numbers.read().await.clone();
        Ok(UserDirectory::from_numbers(numbers))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inserted.read().await.len() as u64)
    }
}
