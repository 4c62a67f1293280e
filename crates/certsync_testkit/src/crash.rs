//! Fault injection for file stores.
//!
//! [`FaultyStore`] wraps any [`FileStore`] and fails selected writes with a
//! simulated I/O error. A failed write never reaches the inner store, which
//! matches the all-or-nothing contract of the real backend: a crashed
//! atomic replace leaves the old file in place.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use certsync_storage::InMemoryStore;
//! use certsync_testkit::crash::FaultyStore;
//!
//! let store = FaultyStore::new(InMemoryStore::new());
//! store.fail_writes_to("tls.key");
//! // ... run a pass, observe that the ledger was not advanced
//! store.heal();
//! ```

use certsync_storage::{FileMode, FileStore, StorageError, StorageResult};
use parking_lot::RwLock;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A store wrapper that can fail writes on demand.
pub struct FaultyStore<S> {
    inner: S,
    fail_paths: RwLock<Vec<PathBuf>>,
    fail_after: AtomicUsize,
    writes_seen: AtomicUsize,
    failures: AtomicUsize,
}

impl<S: FileStore> FaultyStore<S> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_paths: RwLock::new(Vec::new()),
            fail_after: AtomicUsize::new(usize::MAX),
            writes_seen: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Fails every write whose path ends with `suffix`.
    pub fn fail_writes_to(&self, suffix: impl Into<PathBuf>) {
        self.fail_paths.write().push(suffix.into());
    }

    /// Lets the next `n` writes through, then fails every write after them.
    pub fn fail_after_writes(&self, n: usize) {
        self.writes_seen.store(0, Ordering::SeqCst);
        self.fail_after.store(n, Ordering::SeqCst);
    }

    /// Disarms all faults.
    pub fn heal(&self) {
        self.fail_paths.write().clear();
        self.fail_after.store(usize::MAX, Ordering::SeqCst);
        self.writes_seen.store(0, Ordering::SeqCst);
    }

    /// Number of writes that were failed so far.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn should_fail(&self, path: &Path) -> bool {
        if self
            .fail_paths
            .read()
            .iter()
            .any(|suffix| path.ends_with(suffix))
        {
            return true;
        }
        let seen = self.writes_seen.fetch_add(1, Ordering::SeqCst);
        seen >= self.fail_after.load(Ordering::SeqCst)
    }
}

impl<S: FileStore> FileStore for FaultyStore<S> {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()> {
        if self.should_fail(path) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::io(
                path,
                io::Error::new(io::ErrorKind::Other, "simulated crash during write"),
            ));
        }
        self.inner.write(path, contents, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsync_storage::InMemoryStore;

    #[test]
    fn passes_through_when_healthy() {
        let store = FaultyStore::new(InMemoryStore::new());
        store
            .write(Path::new("/out/tls.crt"), b"cert", FileMode::PUBLIC)
            .unwrap();
        assert_eq!(
            store.read(Path::new("/out/tls.crt")).unwrap().as_deref(),
            Some(&b"cert"[..])
        );
        assert_eq!(store.failure_count(), 0);
    }

    #[test]
    fn fails_matching_suffix_only() {
        let store = FaultyStore::new(InMemoryStore::new());
        store.fail_writes_to("tls.key");

        assert!(store
            .write(Path::new("/out/tls.crt"), b"c", FileMode::PUBLIC)
            .is_ok());
        let err = store
            .write(Path::new("/out/tls.key"), b"k", FileMode::PRIVATE)
            .unwrap_err();
        assert_eq!(err.path(), Path::new("/out/tls.key"));
        assert!(!store.inner().exists(Path::new("/out/tls.key")));
        assert_eq!(store.failure_count(), 1);
    }

    #[test]
    fn fails_after_budget() {
        let store = FaultyStore::new(InMemoryStore::new());
        store.fail_after_writes(2);

        assert!(store.write(Path::new("a"), b"1", FileMode::PUBLIC).is_ok());
        assert!(store.write(Path::new("b"), b"2", FileMode::PUBLIC).is_ok());
        assert!(store.write(Path::new("c"), b"3", FileMode::PUBLIC).is_err());
        assert!(store.write(Path::new("d"), b"4", FileMode::PUBLIC).is_err());

        store.heal();
        assert!(store.write(Path::new("c"), b"3", FileMode::PUBLIC).is_ok());
        assert_eq!(store.failure_count(), 2);
    }
}
