//! Publishing a local credential to the store.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::KvStore;
use certsync_protocol::{Credential, Revision};
use certsync_storage::FileStore;
use std::io;
use std::path::Path;
use tracing::{debug, info, info_span};

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// The key written.
    pub key: String,
    /// Revision the store assigned to the write.
    pub revision: Revision,
    /// Size of the JSON payload in bytes.
    pub bytes: usize,
}

/// Puts a certificate/key pair read from local files under a key.
///
/// The material is not validated; whatever the files hold is published.
pub struct PublishEngine<K: KvStore, F: FileStore> {
    config: SyncConfig,
    kv: K,
    files: F,
}

impl<K: KvStore, F: FileStore> PublishEngine<K, F> {
    /// Creates an engine.
    pub fn new(config: SyncConfig, kv: K, files: F) -> Self {
        Self { config, kv, files }
    }

    /// Returns the KV store.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Reads `cert_path` and `key_path` and stores them under `key`.
    ///
    /// # Errors
    ///
    /// `Io` if either file is missing or unreadable; transport errors from
    /// the store otherwise.
    pub fn publish(&self, key: &str, cert_path: &Path, key_path: &Path) -> SyncResult<PublishReport> {
        let span = info_span!("publish", key);
        let _guard = span.enter();

        let certificate = self.read_input(cert_path)?;
        let private_key = self.read_input(key_path)?;
        let credential = Credential::from_bytes(&certificate, &private_key);
        let payload = credential.encode()?;
        debug!(bytes = payload.len(), "payload encoded");

        let revision = self.kv.put(key, &payload, self.config.request_timeout)?;
        info!(%revision, "credential published");

        Ok(PublishReport {
            key: key.to_string(),
            revision,
            bytes: payload.len(),
        })
    }

    fn read_input(&self, path: &Path) -> SyncResult<Vec<u8>> {
        self.files
            .read(path)
            .map_err(SyncError::read)?
            .ok_or_else(|| SyncError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InjectedFailure, MemoryKvStore};
    use certsync_storage::InMemoryStore;
    use certsync_testkit::fixtures::pem;

    fn files() -> InMemoryStore {
        InMemoryStore::new()
            .with_file("/in/tls.crt", pem::EC_CERT)
            .with_file("/in/tls.key", pem::EC_KEY)
    }

    #[test]
    fn publishes_payload() {
        let engine = PublishEngine::new(SyncConfig::default(), MemoryKvStore::new(), files());
        let report = engine
            .publish("k1", Path::new("/in/tls.crt"), Path::new("/in/tls.key"))
            .unwrap();

        assert_eq!(report.key, "k1");
        assert_eq!(report.revision, Revision::new(1));

        let stored = engine.kv().value("k1").unwrap();
        assert_eq!(report.bytes, stored.len());
        let credential = Credential::decode(&stored).unwrap();
        assert_eq!(credential.certificate, pem::EC_CERT);
        assert_eq!(credential.private_key, pem::EC_KEY);
    }

    #[test]
    fn each_publish_is_a_new_revision() {
        let engine = PublishEngine::new(SyncConfig::default(), MemoryKvStore::new(), files());
        let cert = Path::new("/in/tls.crt");
        let key = Path::new("/in/tls.key");
        let first = engine.publish("k1", cert, key).unwrap();
        let second = engine.publish("k1", cert, key).unwrap();
        assert!(second.revision > first.revision);
    }

    #[test]
    fn no_validation_on_publish() {
        let files = InMemoryStore::new()
            .with_file("/in/c", "not a certificate")
            .with_file("/in/k", pem::RSA_OTHER_KEY);
        let engine = PublishEngine::new(SyncConfig::default(), MemoryKvStore::new(), files);
        assert!(engine
            .publish("k1", Path::new("/in/c"), Path::new("/in/k"))
            .is_ok());
    }

    #[test]
    fn missing_input_is_io_error() {
        let engine = PublishEngine::new(SyncConfig::default(), MemoryKvStore::new(), files());
        let err = engine
            .publish("k1", Path::new("/in/tls.crt"), Path::new("/in/missing.key"))
            .unwrap_err();
        match err {
            SyncError::Io { path, source } => {
                assert_eq!(path, Path::new("/in/missing.key"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(engine.kv().request_count(), 0);
    }

    #[test]
    fn store_failure_propagates() {
        let engine = PublishEngine::new(SyncConfig::default(), MemoryKvStore::new(), files());
        engine.kv().fail_next(InjectedFailure::Timeout);
        let err = engine
            .publish("k1", Path::new("/in/tls.crt"), Path::new("/in/tls.key"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
        assert!(engine.kv().value("k1").is_none());
    }
}
