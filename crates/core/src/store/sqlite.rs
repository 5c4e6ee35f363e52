//! SQLite-backed call record store.
//!
//! Records are stored as JSON documents with a few columns pulled out for
//! indexing. The `users` table is owned by the master-data import; this store
//! only creates it if missing and reads phone numbers from it.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::config::StorageConfig;
use super::error::StoreError;
use super::traits::{CallRecordStore, StoredDocumentId};
use crate::record::{CallRecord, UserDirectory};

/// SQLite-backed call record store.
#[derive(Clone)]
pub struct SqliteCallRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCallRecordStore {
    /// Opens (or creates) the database file. Call `provision` before use.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        Self::open(&config.path, config.busy_timeout())
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    pub async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("storage task failed: {e}")))?
    }

    /// All documents stored for a producer row identifier, oldest first.
    pub async fn find_by_pk_id(&self, pk_id: &str) -> Result<Vec<CallRecord>, StoreError> {
        let pk_id = pk_id.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT document FROM call_records WHERE pk_id = ? ORDER BY inserted_at, rowid",
            )?;
            let documents = stmt
                .query_map(params![pk_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            documents
                .iter()
                .map(|doc| serde_json::from_str(doc).map_err(StoreError::from))
                .collect()
        })
        .await
    }

    /// Loads one document by the id `insert` returned.
    pub async fn get(&self, id: &StoredDocumentId) -> Result<Option<CallRecord>, StoreError> {
        let id = id.0.clone();
        self.with_connection(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM call_records WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            document
                .map(|doc| serde_json::from_str(&doc).map_err(StoreError::from))
                .transpose()
        })
        .await
    }
}

#[async_trait]
impl CallRecordStore for SqliteCallRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn provision(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS call_records (
                    id TEXT PRIMARY KEY,
                    pk_id TEXT NOT NULL,
                    call_direction TEXT,
                    origination TEXT,
                    inserted_at TEXT NOT NULL,
                    document TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_call_records_pk_id ON call_records(pk_id);
                CREATE INDEX IF NOT EXISTS idx_call_records_origination ON call_records(origination);

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    phone_number TEXT,
                    name TEXT,
                    department TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_users_phone_number ON users(phone_number);
                "#,
            )?;
            Ok(())
        })
        .await
    }

    async fn insert(&self, record: &CallRecord) -> Result<StoredDocumentId, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let document = serde_json::to_string(record)?;
        let pk_id = record.pk_id.clone();
        let direction = record.call_direction.map(|d| d.as_str());
        let origination = record.originated_at().map(|t| t.to_rfc3339());
        let inserted_at = Utc::now().to_rfc3339();

        let doc_id = id.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO call_records (id, pk_id, call_direction, origination, inserted_at, document) VALUES (?, ?, ?, ?, ?, ?)",
                params![doc_id, pk_id, direction, origination, inserted_at, document],
            )?;
            Ok(())
        })
        .await?;

        Ok(StoredDocumentId(id))
    }

    async fn known_phone_numbers(&self) -> Result<UserDirectory, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT phone_number FROM users WHERE phone_number IS NOT NULL",
            )?;
            let numbers = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(UserDirectory::from_numbers(numbers))
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM call_records", [], |row| {
                row.get(0)
            })?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CallDirection, CallTimes, CallingParty};
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn create_test_store() -> SqliteCallRecordStore {
        let store = SqliteCallRecordStore::in_memory().unwrap();
        store.provision().await.unwrap();
        store
    }

    fn sample_record(pk_id: &str) -> CallRecord {
        let mut record = CallRecord::bare(pk_id);
        record.call_direction = Some(CallDirection::Outgoing);
        record.calling_party = Some(CallingParty {
            number: Some("1001".to_string()),
            ..Default::default()
        });
        record.date_time = Some(CallTimes {
            origination: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            ..Default::default()
        });
        record.duration = Some(60);
        record
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let store = create_test_store().await;
        store.provision().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = create_test_store().await;
        let record = sample_record("pk-1");

        let id = store.insert(&record).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), Some(record));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_does_not_deduplicate() {
        let store = create_test_store().await;
        let record = sample_record("pk-1");

        let first = store.insert(&record).await.unwrap();
        let second = store.insert(&record).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.find_by_pk_id("pk-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_indexed_columns() {
        let store = create_test_store().await;
        store.insert(&sample_record("pk-1")).await.unwrap();

        let (direction, origination) = store
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT call_direction, origination FROM call_records WHERE pk_id = 'pk-1'",
                    [],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(direction, "OUTGOING");
        assert_eq!(origination, "2023-11-14T22:13:20+00:00");
    }

    #[tokio::test]
    async fn test_known_phone_numbers_distinct() {
        let store = create_test_store().await;
        store
            .with_connection(|conn| {
                conn.execute_batch(
                    "INSERT INTO users (phone_number, name) VALUES ('1001', 'a');
                     INSERT INTO users (phone_number, name) VALUES ('1001', 'b');
                     INSERT INTO users (phone_number, name) VALUES ('1002', 'c');
                     INSERT INTO users (phone_number, name) VALUES (NULL, 'd');",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let directory = store.known_phone_numbers().await.unwrap();
        assert_eq!(directory.len(), 2);
        assert!(directory.contains("1001"));
        assert!(directory.contains("1002"));
    }

    #[tokio::test]
    async fn test_insert_before_provision_fails() {
        let store = SqliteCallRecordStore::in_memory().unwrap();
        let err = store.insert(&sample_record("pk-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn test_file_based_store() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            path: temp.path().join("cdr.db"),
            busy_timeout_ms: 1000,
        };

        {
            let store = SqliteCallRecordStore::from_config(&config).unwrap();
            store.provision().await.unwrap();
            store.insert(&sample_record("pk-1")).await.unwrap();
        }

        let store = SqliteCallRecordStore::from_config(&config).unwrap();
        store.provision().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
