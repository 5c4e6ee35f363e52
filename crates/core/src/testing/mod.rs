//! Testing utilities: a mock store and CDR file fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use cdr_ingestor_core::testing::{fixtures, MockCallRecordStore};
//!
//! let store = MockCallRecordStore::new();
//! let csv = fixtures::cdr_csv(&[fixtures::cdr_row("pk-1", "1001", "1002")]);
//! fixtures::write_stale_file(&source.join("cdr_a"), &csv);
//! ```

mod mock_store;

pub use mock_store::MockCallRecordStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    /// Header used by [`cdr_csv`]; [`cdr_row`] produces matching rows.
    pub const CDR_HEADER: &str = "cdrRecordType,globalCallID_callManagerId,globalCallID_callId,\
callingPartyNumber,originalCalledPartyNumber,pkid,dateTimeOrigination,dateTimeConnect,\
dateTimeDisconnect,duration,finalCalledPartyNumber,origDeviceName";

    /// First origination timestamp used by [`cdr_row`] (2023-11-14T22:13:20Z).
    pub const ORIGINATION: i64 = 1_700_000_000;

    /// Build a CDR file body from rows produced by [`cdr_row`].
    pub fn cdr_csv(rows: &[String]) -> String {
        let mut out = String::from(CDR_HEADER);
        out.push('\n');
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    /// A connected 60-second call from `calling` to `called`.
    pub fn cdr_row(pk_id: &str, calling: &str, called: &str) -> String {
        format!(
            "1,1,4711,{calling},{called},{pk_id},{},{},{},60,{called},SEP000000001001",
            ORIGINATION,
            ORIGINATION + 5,
            ORIGINATION + 65,
        )
    }

    /// Write `content` and backdate its modification time by an hour so it
    /// passes any reasonable stability window.
    pub fn write_stale_file(path: &Path, content: &str) {
        write_fresh_file(path, content);
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
    }

    /// Write `content` with a current modification time.
    pub fn write_fresh_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_row_matches_header_width() {
            let header_len = CDR_HEADER.split(',').count();
            let row = cdr_row("pk-1", "1001", "1002");
            assert_eq!(header_len, 12);
            assert_eq!(row.split(',').count(), header_len);
            assert!(cdr_csv(&[row]).len() >= 100);
        }

        #[test]
        fn test_stale_file_is_backdated() {
            let temp = tempfile::TempDir::new().unwrap();
            let path = temp.path().join("cdr_a");
            write_stale_file(&path, "pkid\n1\n");

            let age = SystemTime::now()
                .duration_since(fs::metadata(&path).unwrap().modified().unwrap())
                .unwrap();
            assert!(age >= Duration::from_secs(3000));
        }
    }
}
