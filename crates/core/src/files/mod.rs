//! File arrival, readiness and locking.
//!
//! The filesystem is the only state store: an available file is a matching
//! name in the source directory, a locked file carries the locked suffix, and
//! an archived file lives under `archive_dir/YYYY/MM/`.

mod config;
mod error;
mod manager;
mod state;

pub use config::FilesConfig;
pub use error::FileStateError;
pub use manager::FileStateManager;
pub use state::{ArchiveOutcome, FileState, FileStats, LockedFile};
