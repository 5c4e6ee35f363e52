//! Leaf coercions from raw column text into typed values.
//!
//! None of these fail. A value that cannot be coerced becomes absent and a
//! [`FieldWarning`] is recorded on the reader.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, TimeZone, Utc};

use super::address::{self, AddressError};
use super::columns::RawRow;

/// Why a present value was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    NotAnInteger,
    TimestampOutOfRange,
    AddressUnset,
    AddressOutOfRange,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAnInteger => "not_an_integer",
            Self::TimestampOutOfRange => "timestamp_out_of_range",
            Self::AddressUnset => "address_unset",
            Self::AddressOutOfRange => "address_out_of_range",
        }
    }
}

/// A non-fatal problem with one field of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    pub column: &'static str,
    pub value: String,
    pub kind: WarningKind,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?} ({})", self.column, self.value, self.kind.as_str())
    }
}

/// Reads typed leaves from a row, collecting warnings as it goes.
pub struct FieldReader<'r> {
    row: &'r RawRow,
    warnings: Vec<FieldWarning>,
}

impl<'r> FieldReader<'r> {
    pub fn new(row: &'r RawRow) -> Self {
        Self {
            row,
            warnings: Vec::new(),
        }
    }

    /// Trimmed text, blank treated as absent.
    pub fn text(&self, column: &'static str) -> Option<String> {
        self.row.get(column).map(str::to_string)
    }

    /// Base-10 integer. Anything else present is a warning.
    pub fn int(&mut self, column: &'static str) -> Option<i64> {
        let raw = self.row.get(column)?;
        match raw.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.warn(column, raw, WarningKind::NotAnInteger);
                None
            }
        }
    }

    /// Integer truthiness: zero is false, every other integer is true.
    pub fn flag(&mut self, column: &'static str) -> Option<bool> {
        self.int(column).map(|v| v != 0)
    }

    /// Epoch seconds to a UTC instant. Zero means "no timestamp".
    pub fn instant(&mut self, column: &'static str) -> Option<DateTime<Utc>> {
        let secs = self.int(column)?;
        if secs == 0 {
            return None;
        }
        match Utc.timestamp_opt(secs, 0).single() {
            Some(at) => Some(at),
            None => {
                self.warn_value(column, secs, WarningKind::TimestampOutOfRange);
                None
            }
        }
    }

    /// Integer-encoded IPv4 address. Zero and out-of-range values warn.
    pub fn address(&mut self, column: &'static str) -> Option<Ipv4Addr> {
        let value = self.int(column)?;
        match address::decode(value) {
            Ok(addr) => Some(addr),
            Err(AddressError::Unset) => {
                self.warn_value(column, value, WarningKind::AddressUnset);
                None
            }
            Err(AddressError::OutOfRange(_)) => {
                self.warn_value(column, value, WarningKind::AddressOutOfRange);
                None
            }
        }
    }

    pub fn warnings(&self) -> &[FieldWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<FieldWarning> {
        self.warnings
    }

    fn warn(&mut self, column: &'static str, raw: &str, kind: WarningKind) {
        self.warnings.push(FieldWarning {
            column,
            value: raw.to_string(),
            kind,
        });
    }

    fn warn_value(&mut self, column: &'static str, value: i64, kind: WarningKind) {
        self.warnings.push(FieldWarning {
            column,
            value: value.to_string(),
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_int_parses_with_whitespace() {
        let r = row(&[("duration", " 42 ")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.int("duration"), Some(42));
        assert!(reader.warnings().is_empty());
    }

    #[test]
    fn test_int_non_numeric_warns() {
        let r = row(&[("duration", "4x2")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.int("duration"), None);

        let warnings = reader.into_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].column, "duration");
        assert_eq!(warnings[0].value, "4x2");
        assert_eq!(warnings[0].kind, WarningKind::NotAnInteger);
    }

    #[test]
    fn test_absent_and_blank_do_not_warn() {
        let r = row(&[("duration", "")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.int("duration"), None);
        assert_eq!(reader.int("origNodeId"), None);
        assert_eq!(reader.text("comment"), None);
        assert!(reader.warnings().is_empty());
    }

    #[test]
    fn test_flag_truthiness() {
        let r = row(&[
            ("wasCallQueued", "0"),
            ("callSecuredStatus", "1"),
            ("joinOnBehalfOf", "-3"),
        ]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.flag("wasCallQueued"), Some(false));
        assert_eq!(reader.flag("callSecuredStatus"), Some(true));
        assert_eq!(reader.flag("joinOnBehalfOf"), Some(true));
        assert_eq!(reader.flag("totalWaitTimeInQueue"), None);
    }

    #[test]
    fn test_instant_zero_is_absent_without_warning() {
        let r = row(&[("dateTimeConnect", "0"), ("dateTimeOrigination", "1700000000")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.instant("dateTimeConnect"), None);
        let at = reader.instant("dateTimeOrigination").unwrap();
        assert_eq!(at.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert!(reader.warnings().is_empty());
    }

    #[test]
    fn test_instant_out_of_range_warns() {
        let r = row(&[("dateTimeDisconnect", "9223372036854775807")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.instant("dateTimeDisconnect"), None);
        assert_eq!(
            reader.warnings()[0].kind,
            WarningKind::TimestampOutOfRange
        );
    }

    #[test]
    fn test_address_zero_warns() {
        let r = row(&[("origIpAddr", "0"), ("destIpAddr", "167772161")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.address("origIpAddr"), None);
        assert_eq!(
            reader.address("destIpAddr"),
            Some(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(reader.warnings().len(), 1);
        assert_eq!(reader.warnings()[0].kind, WarningKind::AddressUnset);
    }

    #[test]
    fn test_address_unparsable_warns_once() {
        let r = row(&[("origIpAddr", "10.0.0.1")]);
        let mut reader = FieldReader::new(&r);
        assert_eq!(reader.address("origIpAddr"), None);
        assert_eq!(reader.warnings().len(), 1);
        assert_eq!(reader.warnings()[0].kind, WarningKind::NotAnInteger);
    }

    #[test]
    fn test_warning_display() {
        let warning = FieldWarning {
            column: "duration",
            value: "abc".to_string(),
            kind: WarningKind::NotAnInteger,
        };
        assert_eq!(warning.to_string(), "duration=\"abc\" (not_an_integer)");
    }
}
