//! KV store abstraction.

use crate::error::{SyncError, SyncResult};
use certsync_protocol::{KvEntry, Revision};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The key-value store a credential is distributed through.
///
/// Each call is one bounded round trip. Exceeding `timeout` must fail with
/// [`SyncError::Timeout`].
///
/// # Implementors
///
/// - [`crate::EtcdTransport`] - etcd v3 over its JSON gateway
/// - [`MemoryKvStore`] - for testing
pub trait KvStore: Send + Sync {
    /// Fetches `key`, returning `None` if it does not exist.
    fn get(&self, key: &str, timeout: Duration) -> SyncResult<Option<KvEntry>>;

    /// Stores `value` under `key` and returns the new revision.
    fn put(&self, key: &str, value: &[u8], timeout: Duration) -> SyncResult<Revision>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &str, timeout: Duration) -> SyncResult<Option<KvEntry>> {
        (**self).get(key, timeout)
    }

    fn put(&self, key: &str, value: &[u8], timeout: Duration) -> SyncResult<Revision> {
        (**self).put(key, value, timeout)
    }
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &str, timeout: Duration) -> SyncResult<Option<KvEntry>> {
        (**self).get(key, timeout)
    }

    fn put(&self, key: &str, value: &[u8], timeout: Duration) -> SyncResult<Revision> {
        (**self).put(key, value, timeout)
    }
}

/// A failure the [`MemoryKvStore`] can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// The next request times out.
    Timeout,
    /// The next request fails with a retryable transport error.
    Unavailable,
}

/// An in-memory KV store for testing.
///
/// Revisions behave like etcd's: a single store-wide counter, incremented
/// by every put, so the first put returns revision 1.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, (Revision, Vec<u8>)>>,
    revision: RwLock<Revision>,
    next_failure: RwLock<Option<InjectedFailure>>,
    requests: RwLock<usize>,
    last_timeout: RwLock<Option<Duration>>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` at an explicit revision.
    ///
    /// Raises the store-wide counter to `revision` if it is behind.
    pub fn set(&self, key: impl Into<String>, revision: Revision, value: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .insert(key.into(), (revision, value.into()));
        let mut current = self.revision.write();
        if *current < revision {
            *current = revision;
        }
    }

    /// Deletes `key`.
    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Makes the next request fail.
    pub fn fail_next(&self, failure: InjectedFailure) {
        *self.next_failure.write() = Some(failure);
    }

    /// Returns the stored value under `key`.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).map(|(_, v)| v.clone())
    }

    /// Returns the store-wide revision.
    pub fn current_revision(&self) -> Revision {
        *self.revision.read()
    }

    /// Number of get and put calls served or failed.
    pub fn request_count(&self) -> usize {
        *self.requests.read()
    }

    /// The timeout passed with the most recent request.
    pub fn last_timeout(&self) -> Option<Duration> {
        *self.last_timeout.read()
    }

    fn begin(&self, timeout: Duration) -> SyncResult<()> {
        *self.requests.write() += 1;
        *self.last_timeout.write() = Some(timeout);
        match self.next_failure.write().take() {
            Some(InjectedFailure::Timeout) => Err(SyncError::Timeout),
            Some(InjectedFailure::Unavailable) => {
                Err(SyncError::transport_retryable("store unavailable"))
            }
            None => Ok(()),
        }
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str, timeout: Duration) -> SyncResult<Option<KvEntry>> {
        self.begin(timeout)?;
        Ok(self
            .entries
            .read()
            .get(key)
            .map(|(revision, value)| KvEntry::new(key, *revision, value.clone())))
    }

    fn put(&self, key: &str, value: &[u8], timeout: Duration) -> SyncResult<Revision> {
        self.begin(timeout)?;
        let revision = {
            let mut current = self.revision.write();
            *current = current.next();
            *current
        };
        self.entries
            .write()
            .insert(key.to_string(), (revision, value.to_vec()));
        Ok(revision)
    }
}
