//! Call record persistence.

mod config;
mod error;
mod sqlite;
mod traits;

pub use crate::record::UserDirectory;
pub use config::StorageConfig;
pub use error::StoreError;
pub use sqlite::SqliteCallRecordStore;
pub use traits::{CallRecordStore, StoredDocumentId};
