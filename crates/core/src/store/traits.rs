//! Trait definitions for the store module.

use async_trait::async_trait;
use std::fmt;

use super::error::StoreError;
use crate::record::{CallRecord, UserDirectory};

/// Identifier the store assigned to an inserted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredDocumentId(pub String);

impl fmt::Display for StoredDocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document store for call records, plus read access to the user directory.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Creates collections and indexes. Safe to run more than once.
    async fn provision(&self) -> Result<(), StoreError>;

    /// Inserts one record as a new document. No deduplication is performed.
    async fn insert(&self, record: &CallRecord) -> Result<StoredDocumentId, StoreError>;

    /// Reads the distinct set of known internal phone numbers.
    async fn known_phone_numbers(&self) -> Result<UserDirectory, StoreError>;

    /// Number of stored call records.
    async fn count(&self) -> Result<u64, StoreError>;
}
