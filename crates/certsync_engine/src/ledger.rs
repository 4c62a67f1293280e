//! The version ledger: the last revision that was fully synchronized.

use crate::error::{SyncError, SyncResult};
use certsync_protocol::Revision;
use certsync_storage::{FileMode, FileStore};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable record of the last synchronized revision.
///
/// The file holds the revision in decimal. A missing file reads as
/// [`Revision::ZERO`]; a file with anything other than a decimal number
/// (surrounding whitespace aside) is a hard error, never a silent reset.
///
/// Accepting surrounding ASCII whitespace is looser than a strict integer
/// parse, which rejects `"7\n"`. It lets an operator seed the file with
/// `echo 7 > .last_version`; certsync itself always writes bare digits.
#[derive(Debug)]
pub struct VersionLedger<F: FileStore> {
    store: F,
    path: PathBuf,
}

impl<F: FileStore> VersionLedger<F> {
    /// Creates a ledger backed by `path` in `store`.
    pub fn new(store: F, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// The ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the last synchronized revision.
    ///
    /// # Errors
    ///
    /// `CorruptLedger` if the file exists but is not a revision, `Io` if it
    /// cannot be read.
    pub fn read_last_version(&self) -> SyncResult<Revision> {
        let bytes = self.store.read(&self.path).map_err(SyncError::read)?;

        let Some(bytes) = bytes else {
            debug!(path = %self.path.display(), "no ledger, starting from 0");
            return Ok(Revision::ZERO);
        };

        let text = String::from_utf8_lossy(&bytes);
        text.trim_matches(|c: char| c.is_ascii_whitespace())
            .parse::<Revision>()
            .map_err(|_| SyncError::CorruptLedger {
                path: self.path.clone(),
                content: text.into_owned(),
            })
    }

    /// Records `revision` as synchronized.
    ///
    /// # Errors
    ///
    /// `Persist` if the file cannot be written; the previous value stays.
    pub fn write_version(&self, revision: Revision) -> SyncResult<()> {
        self.store
            .write(&self.path, revision.to_string().as_bytes(), FileMode::PUBLIC)
            .map_err(SyncError::persist)?;
        debug!(path = %self.path.display(), %revision, "ledger advanced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsync_storage::{FileBackend, InMemoryStore};
    use certsync_testkit::generators::revision_strategy;
    use proptest::prelude::*;

    #[test]
    fn missing_file_is_zero() {
        let ledger = VersionLedger::new(InMemoryStore::new(), ".last_version");
        assert_eq!(ledger.read_last_version().unwrap(), Revision::ZERO);
    }

    #[test]
    fn write_then_read() {
        let store = InMemoryStore::new();
        let ledger = VersionLedger::new(&store, "/state/.last_version");
        ledger.write_version(Revision::new(42)).unwrap();

        assert_eq!(store.text("/state/.last_version").as_deref(), Some("42"));
        assert_eq!(ledger.read_last_version().unwrap(), Revision::new(42));
    }

    #[test]
    fn whitespace_tolerated() {
        for content in ["7\n", "  7", "7\r\n", "\t7 \n"] {
            let store = InMemoryStore::new().with_file("rev", content);
            let ledger = VersionLedger::new(store, "rev");
            assert_eq!(ledger.read_last_version().unwrap(), Revision::new(7));
        }
    }

    #[test]
    fn corrupt_content_is_fatal() {
        for content in ["", "\n", "abc", "-1", "7 8", "7x", "0x10", "+3"] {
            let store = InMemoryStore::new().with_file("rev", content);
            let ledger = VersionLedger::new(store, "rev");
            match ledger.read_last_version() {
                Err(SyncError::CorruptLedger { path, content: found }) => {
                    assert_eq!(path, PathBuf::from("rev"));
                    assert_eq!(found, content);
                }
                other => panic!("{content:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn fresh_reader_sees_written_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".last_version");

        VersionLedger::new(FileBackend::new(), &path)
            .write_version(Revision::new(1234))
            .unwrap();

        let reader = VersionLedger::new(FileBackend::new(), &path);
        assert_eq!(reader.read_last_version().unwrap(), Revision::new(1234));
    }

    proptest! {
        #[test]
        fn padded_revision_reads_back(
            revision in revision_strategy(),
            lead in "[ \t\r\n]{0,3}",
            trail in "[ \t\r\n]{0,3}",
        ) {
            let content = format!("{lead}{revision}{trail}");
            let ledger = VersionLedger::new(InMemoryStore::new().with_file("rev", content), "rev");
            prop_assert_eq!(ledger.read_last_version().unwrap(), revision);
        }
    }
}
