//! Call records and the row-to-record transformation.

pub mod address;
mod coerce;
mod columns;
mod directory;
mod transform;
mod types;

pub use coerce::{FieldReader, FieldWarning, WarningKind};
pub use columns::{recognize, HeaderMap, RawRow, IDENTIFIER_COLUMN, RECOGNIZED_COLUMNS};
pub use directory::UserDirectory;
pub use transform::{RecordTransformer, TransformError, Transformed};
pub use types::*;
