//! In-memory store for testing.

use crate::error::StorageResult;
use crate::store::{FileMode, FileStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct StoredFile {
    contents: Vec<u8>,
    mode: FileMode,
}

/// An in-memory file store.
///
/// Keeps every file in a map and counts writes, so tests can assert not
/// only what a pass wrote but also that it wrote nothing.
///
/// # Example
///
/// ```rust
/// use certsync_storage::{FileMode, FileStore, InMemoryStore};
/// use std::path::Path;
///
/// let store = InMemoryStore::new();
/// store.write(Path::new("a"), b"1", FileMode::PUBLIC).unwrap();
/// assert_eq!(store.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: RwLock<HashMap<PathBuf, StoredFile>>,
    writes: RwLock<Vec<PathBuf>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file without counting it as a write.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.write().insert(
            path.into(),
            StoredFile {
                contents: contents.into(),
                mode: FileMode::default(),
            },
        );
        self
    }

    /// Returns the current content of `path`.
    #[must_use]
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files
            .read()
            .get(path.as_ref())
            .map(|f| f.contents.clone())
    }

    /// Returns the current content of `path` as UTF-8 text.
    #[must_use]
    pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
        self.contents(path)
            .map(|c| String::from_utf8_lossy(&c).into_owned())
    }

    /// Returns the mode `path` was last written with.
    #[must_use]
    pub fn mode(&self, path: impl AsRef<Path>) -> Option<FileMode> {
        self.files.read().get(path.as_ref()).map(|f| f.mode)
    }

    /// Returns true if `path` exists.
    #[must_use]
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.files.read().contains_key(path.as_ref())
    }

    /// Total number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.read().len()
    }

    /// Paths written so far, in order.
    #[must_use]
    pub fn write_log(&self) -> Vec<PathBuf> {
        self.writes.read().clone()
    }

    /// Removes `path`, returning its previous content.
    pub fn remove(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files
            .write()
            .remove(path.as_ref())
            .map(|f| f.contents)
    }
}

impl FileStore for InMemoryStore {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.contents(path))
    }

    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()> {
        self.files.write().insert(
            path.to_path_buf(),
            StoredFile {
                contents: contents.to_vec(),
                mode,
            },
        );
        self.writes.write().push(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_read_missing() {
        let store = InMemoryStore::new();
        assert_eq!(store.read(Path::new("nope")).unwrap(), None);
        assert!(!store.exists("nope"));
    }

    #[test]
    fn memory_write_and_read() {
        let store = InMemoryStore::new();
        store
            .write(Path::new("tls.key"), b"key", FileMode::PRIVATE)
            .unwrap();

        assert_eq!(store.read(Path::new("tls.key")).unwrap(), Some(b"key".to_vec()));
        assert_eq!(store.mode("tls.key"), Some(FileMode::PRIVATE));
        assert_eq!(store.text("tls.key").as_deref(), Some("key"));
    }

    #[test]
    fn seeded_files_are_not_writes() {
        let store = InMemoryStore::new().with_file(".last_version", "4");

        assert_eq!(store.write_count(), 0);
        assert_eq!(store.text(".last_version").as_deref(), Some("4"));
    }

    #[test]
    fn write_log_keeps_order() {
        let store = InMemoryStore::new();
        for name in ["cert", "key", "ledger"] {
            store.write(Path::new(name), b"", FileMode::PUBLIC).unwrap();
        }

        assert_eq!(store.write_count(), 3);
        assert_eq!(
            store.write_log(),
            vec![
                PathBuf::from("cert"),
                PathBuf::from("key"),
                PathBuf::from("ledger")
            ]
        );
    }

    #[test]
    fn remove_file() {
        let store = InMemoryStore::new().with_file("a", "1");
        assert_eq!(store.remove("a"), Some(b"1".to_vec()));
        assert!(!store.exists("a"));
    }
}
