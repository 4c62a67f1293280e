//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::ledger::VersionLedger;
use crate::transport::KvStore;
use crate::validator;
use certsync_protocol::{Credential, Revision};
use certsync_storage::FileStore;
use parking_lot::RwLock;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// The step a pass is in, or ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No pass has run yet.
    Idle,
    /// Reading the ledger.
    ReadLedger,
    /// Fetching the key from the store.
    Fetch,
    /// Comparing the fetched revision with the ledger.
    Compare,
    /// Decoding the payload.
    Parse,
    /// Validating the credential.
    Validate,
    /// Writing the certificate and key files.
    Persist,
    /// Writing the ledger.
    AdvanceLedger,
    /// The last pass materialized a new revision.
    Done,
    /// The last pass found nothing new.
    NoOp,
    /// The last pass failed.
    Failed,
}

impl SyncPhase {
    /// Returns true while a pass is running.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            SyncPhase::Idle | SyncPhase::Done | SyncPhase::NoOp | SyncPhase::Failed
        )
    }
}

/// What a successful pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The store's revision was not newer than the ledger.
    NoOp {
        /// Revision reported by the store.
        current: Revision,
        /// Revision in the ledger.
        last: Revision,
    },
    /// A new revision was validated and materialized.
    Done {
        /// Ledger value before the pass.
        previous: Revision,
        /// Revision now in the ledger.
        revision: Revision,
        /// Hex SHA-256 of the materialized certificate.
        fingerprint: String,
    },
}

impl SyncOutcome {
    /// Returns true if nothing was written.
    pub fn is_no_op(&self) -> bool {
        matches!(self, SyncOutcome::NoOp { .. })
    }

    /// The revision the local files correspond to after the pass.
    pub fn revision(&self) -> Revision {
        match self {
            SyncOutcome::NoOp { last, .. } => *last,
            SyncOutcome::Done { revision, .. } => *revision,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::NoOp { current, last } => write!(
                f,
                "No updates. Current version: {current}, Last version: {last}"
            ),
            SyncOutcome::Done {
                previous, revision, ..
            } => write!(f, "New version detected: {revision} (previous: {previous})"),
        }
    }
}

/// Counters across the passes of one engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes started.
    pub passes: u64,
    /// Passes that materialized a new revision.
    pub applied: u64,
    /// Passes that found nothing new.
    pub no_ops: u64,
    /// Passes that failed.
    pub failures: u64,
    /// Last revision materialized by this engine.
    pub last_revision: Option<Revision>,
    /// Fingerprint of the last materialized certificate.
    pub last_fingerprint: Option<String>,
    /// Phase the last failure happened in.
    pub failed_phase: Option<SyncPhase>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Duration of the last pass.
    pub last_duration: Option<Duration>,
}

/// Runs version-gated synchronization passes.
///
/// One pass reads the ledger, fetches the key, and only when the store's
/// revision is strictly newer decodes, validates and materializes the
/// credential. The ledger is written last, so any failure leaves it at its
/// previous value and the next pass starts over.
pub struct SyncEngine<K: KvStore, F: FileStore> {
    config: SyncConfig,
    kv: K,
    files: F,
    phase: RwLock<SyncPhase>,
    stats: RwLock<SyncStats>,
}

impl<K: KvStore, F: FileStore> SyncEngine<K, F> {
    /// Creates an engine.
    pub fn new(config: SyncConfig, kv: K, files: F) -> Self {
        Self {
            config,
            kv,
            files,
            phase: RwLock::new(SyncPhase::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the KV store.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Returns the file store.
    pub fn files(&self) -> &F {
        &self.files
    }

    /// Gets the current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The ledger this engine reads and advances.
    pub fn ledger(&self) -> VersionLedger<&F> {
        VersionLedger::new(&self.files, &self.config.ledger_path)
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    /// Runs one pass for `key`, materializing into `out_cert` and `out_key`.
    ///
    /// # Errors
    ///
    /// Any failure ends the pass. The ledger is never advanced by a failed
    /// pass, and no file is touched unless validation succeeded.
    pub fn sync(&self, key: &str, out_cert: &Path, out_key: &Path) -> SyncResult<SyncOutcome> {
        let span = info_span!("sync", key);
        let _guard = span.enter();
        let start = Instant::now();
        self.stats.write().passes += 1;

        let result = self.run(key, out_cert, out_key);

        let mut stats = self.stats.write();
        stats.last_duration = Some(start.elapsed());
        match &result {
            Ok(outcome @ SyncOutcome::NoOp { .. }) => {
                self.set_phase(SyncPhase::NoOp);
                stats.no_ops += 1;
                stats.last_error = None;
                info!("{outcome}");
            }
            Ok(
                outcome @ SyncOutcome::Done {
                    revision,
                    fingerprint,
                    ..
                },
            ) => {
                self.set_phase(SyncPhase::Done);
                stats.applied += 1;
                stats.last_revision = Some(*revision);
                stats.last_fingerprint = Some(fingerprint.clone());
                stats.last_error = None;
                info!(%fingerprint, "{outcome}");
            }
            Err(e) => {
                stats.failures += 1;
                stats.failed_phase = Some(self.phase());
                stats.last_error = Some(e.to_string());
                self.set_phase(SyncPhase::Failed);
            }
        }
        result
    }

    fn run(&self, key: &str, out_cert: &Path, out_key: &Path) -> SyncResult<SyncOutcome> {
        self.set_phase(SyncPhase::ReadLedger);
        let ledger = self.ledger();
        let last = ledger.read_last_version()?;

        self.set_phase(SyncPhase::Fetch);
        let entry = self
            .kv
            .get(key, self.config.request_timeout)?
            .ok_or_else(|| SyncError::KeyNotFound {
                key: key.to_string(),
            })?;
        debug!(revision = %entry.revision, bytes = entry.value.len(), "fetched");

        self.set_phase(SyncPhase::Compare);
        if entry.revision <= last {
            return Ok(SyncOutcome::NoOp {
                current: entry.revision,
                last,
            });
        }
        info!(revision = %entry.revision, previous = %last, "new revision detected");

        self.set_phase(SyncPhase::Parse);
        let credential =
            Credential::decode(&entry.value).map_err(|e| SyncError::MalformedPayload {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        self.set_phase(SyncPhase::Validate);
        let algorithm = validator::validate(&credential.certificate, &credential.private_key)
            .inspect_err(|e| warn!(revision = %entry.revision, error = %e, "credential rejected"))?;
        let fingerprint = validator::certificate_fingerprint(&credential.certificate)?;
        debug!(%algorithm, "credential valid");

        self.set_phase(SyncPhase::Persist);
        self.files
            .write(
                out_cert,
                credential.certificate.as_bytes(),
                self.config.certificate_mode,
            )
            .map_err(SyncError::persist)?;
        debug!(path = %out_cert.display(), "certificate written");
        self.files
            .write(
                out_key,
                credential.private_key.as_bytes(),
                self.config.private_key_mode,
            )
            .map_err(SyncError::persist)?;
        debug!(path = %out_key.display(), "private key written");

        self.set_phase(SyncPhase::AdvanceLedger);
        ledger.write_version(entry.revision)?;

        Ok(SyncOutcome::Done {
            previous: last,
            revision: entry.revision,
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InjectedFailure, MemoryKvStore};
    use crate::validator::CredentialErrorKind;
    use certsync_storage::{FileMode, InMemoryStore};
    use certsync_testkit::fixtures::{
        expired_rsa_credential, mismatched_rsa_credential, payload, pem, valid_ec_credential,
        valid_rsa_credential,
    };
    use std::path::PathBuf;

    const KEY: &str = "/service/pg/tls";

    fn paths() -> (PathBuf, PathBuf) {
        (PathBuf::from("/out/tls.crt"), PathBuf::from("/out/tls.key"))
    }

    fn engine() -> SyncEngine<MemoryKvStore, InMemoryStore> {
        SyncEngine::new(SyncConfig::default(), MemoryKvStore::new(), InMemoryStore::new())
    }

    #[test]
    fn first_pass_materializes() {
        let engine = engine();
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(5), payload(&valid_rsa_credential()));

        let outcome = engine.sync(KEY, &cert, &key).unwrap();
        match &outcome {
            SyncOutcome::Done {
                previous,
                revision,
                fingerprint,
            } => {
                assert_eq!(*previous, Revision::ZERO);
                assert_eq!(*revision, Revision::new(5));
                assert_eq!(fingerprint.len(), 64);
            }
            other => panic!("unexpected {other:?}"),
        }

        let files = engine.files();
        assert_eq!(files.text(&cert).as_deref(), Some(pem::RSA_CERT));
        assert_eq!(files.text(&key).as_deref(), Some(pem::RSA_KEY));
        assert_eq!(files.mode(&cert), Some(FileMode::PUBLIC));
        assert_eq!(files.mode(&key), Some(FileMode::PRIVATE));
        assert_eq!(files.text(".last_version").as_deref(), Some("5"));
        assert_eq!(engine.phase(), SyncPhase::Done);
    }

    #[test]
    fn persist_order_is_cert_key_ledger() {
        let engine = engine();
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(1), payload(&valid_ec_credential()));
        engine.sync(KEY, &cert, &key).unwrap();

        assert_eq!(
            engine.files().write_log(),
            vec![cert, key, PathBuf::from(".last_version")]
        );
    }

    #[test]
    fn equal_revision_is_no_op() {
        let engine = engine();
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(3), payload(&valid_rsa_credential()));
        engine.sync(KEY, &cert, &key).unwrap();
        let writes = engine.files().write_count();

        let outcome = engine.sync(KEY, &cert, &key).unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::NoOp {
                current: Revision::new(3),
                last: Revision::new(3)
            }
        );
        assert_eq!(engine.files().write_count(), writes);
        assert_eq!(engine.phase(), SyncPhase::NoOp);
    }

    #[test]
    fn older_revision_is_no_op() {
        let files = InMemoryStore::new().with_file(".last_version", "10");
        let engine = SyncEngine::new(SyncConfig::default(), MemoryKvStore::new(), files);
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(7), payload(&valid_rsa_credential()));

        let outcome = engine.sync(KEY, &cert, &key).unwrap();
        assert!(outcome.is_no_op());
        assert_eq!(outcome.revision(), Revision::new(10));
        assert!(!engine.files().exists(&cert));
    }

    #[test]
    fn missing_key_fails() {
        let engine = engine();
        let (cert, key) = paths();
        let err = engine.sync(KEY, &cert, &key).unwrap_err();
        assert!(matches!(err, SyncError::KeyNotFound { key } if key == KEY));
        assert_eq!(engine.stats().failed_phase, Some(SyncPhase::Fetch));
    }

    #[test]
    fn deleted_key_keeps_materialized_files() {
        let engine = engine();
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(6), payload(&valid_ec_credential()));
        engine.sync(KEY, &cert, &key).unwrap();
        let writes = engine.files().write_count();

        engine.kv().remove(KEY);
        let err = engine.sync(KEY, &cert, &key).unwrap_err();
        assert!(matches!(err, SyncError::KeyNotFound { .. }));
        assert_eq!(engine.files().write_count(), writes);
        assert_eq!(engine.files().text(&cert).as_deref(), Some(pem::EC_CERT));
        assert_eq!(engine.ledger().read_last_version().unwrap(), Revision::new(6));
    }

    #[test]
    fn malformed_payload_touches_nothing() {
        let engine = engine();
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(2), b"{\"certificate\": \"x\"}".to_vec());

        let err = engine.sync(KEY, &cert, &key).unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload { .. }));
        assert_eq!(engine.files().write_count(), 0);
        assert_eq!(engine.stats().failed_phase, Some(SyncPhase::Parse));
    }

    #[test]
    fn invalid_credentials_touch_nothing() {
        for (credential, expected) in [
            (expired_rsa_credential(), CredentialErrorKind::Expired),
            (mismatched_rsa_credential(), CredentialErrorKind::KeyMismatch),
        ] {
            let engine = engine();
            let (cert, key) = paths();
            engine.kv().set(KEY, Revision::new(4), payload(&credential));

            match engine.sync(KEY, &cert, &key) {
                Err(SyncError::InvalidCredential(e)) => assert_eq!(e.kind(), expected),
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(engine.files().write_count(), 0);
            assert_eq!(engine.ledger().read_last_version().unwrap(), Revision::ZERO);
        }
    }

    #[test]
    fn corrupt_ledger_skips_fetch() {
        let files = InMemoryStore::new().with_file(".last_version", "garbage");
        let engine = SyncEngine::new(SyncConfig::default(), MemoryKvStore::new(), files);
        let (cert, key) = paths();

        let err = engine.sync(KEY, &cert, &key).unwrap_err();
        assert!(matches!(err, SyncError::CorruptLedger { .. }));
        assert_eq!(engine.kv().request_count(), 0);
    }

    #[test]
    fn timeout_is_passed_and_reported() {
        let config = SyncConfig::default().with_request_timeout(Duration::from_millis(300));
        let engine = SyncEngine::new(config, MemoryKvStore::new(), InMemoryStore::new());
        let (cert, key) = paths();
        engine.kv().fail_next(InjectedFailure::Timeout);

        let err = engine.sync(KEY, &cert, &key).unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
        assert!(err.is_retryable());
        assert_eq!(engine.kv().last_timeout(), Some(Duration::from_millis(300)));
        assert_eq!(engine.files().write_count(), 0);
    }

    #[test]
    fn custom_modes_and_ledger_path() {
        let config = SyncConfig::default()
            .with_ledger_path("/state/rev")
            .with_certificate_mode(FileMode(0o640))
            .with_private_key_mode(FileMode(0o400));
        let engine = SyncEngine::new(config, MemoryKvStore::new(), InMemoryStore::new());
        let (cert, key) = paths();
        engine
            .kv()
            .set(KEY, Revision::new(8), payload(&valid_rsa_credential()));
        engine.sync(KEY, &cert, &key).unwrap();

        assert_eq!(engine.files().mode(&cert), Some(FileMode(0o640)));
        assert_eq!(engine.files().mode(&key), Some(FileMode(0o400)));
        assert_eq!(engine.files().text("/state/rev").as_deref(), Some("8"));
    }

    #[test]
    fn stats_track_passes() {
        let engine = engine();
        let (cert, key) = paths();
        let _ = engine.sync(KEY, &cert, &key);
        engine
            .kv()
            .set(KEY, Revision::new(1), payload(&valid_rsa_credential()));
        engine.sync(KEY, &cert, &key).unwrap();
        engine.sync(KEY, &cert, &key).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.passes, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.no_ops, 1);
        assert_eq!(stats.last_revision, Some(Revision::new(1)));
        assert!(stats.last_error.is_none());
    }

    #[test]
    fn outcome_messages() {
        let done = SyncOutcome::Done {
            previous: Revision::new(1),
            revision: Revision::new(2),
            fingerprint: String::new(),
        };
        assert_eq!(done.to_string(), "New version detected: 2 (previous: 1)");
        let no_op = SyncOutcome::NoOp {
            current: Revision::new(2),
            last: Revision::new(2),
        };
        assert_eq!(
            no_op.to_string(),
            "No updates. Current version: 2, Last version: 2"
        );
        assert!(!SyncPhase::Done.is_active());
        assert!(SyncPhase::Persist.is_active());
    }
}
