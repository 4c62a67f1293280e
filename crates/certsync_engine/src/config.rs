//! Configuration for the sync and publish engines.

use certsync_storage::FileMode;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on one KV round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on establishing the TLS connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default ledger file, relative to the working directory.
pub const DEFAULT_LEDGER_PATH: &str = ".last_version";

/// Configuration for a sync or publish pass.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deadline for one KV request.
    pub request_timeout: Duration,
    /// Deadline for connection setup, including the TLS handshake.
    pub connect_timeout: Duration,
    /// Where the last synchronized revision is kept.
    pub ledger_path: PathBuf,
    /// Permissions for the materialized certificate.
    ///
    /// Applied on every write, replacing the bits of an existing file. The
    /// existing owner and group are kept.
    pub certificate_mode: FileMode,
    /// Permissions for the materialized private key, applied like
    /// [`certificate_mode`](Self::certificate_mode).
    pub private_key_mode: FileMode,
}

impl SyncConfig {
    /// Creates a configuration with the default timeouts, ledger path and
    /// file modes.
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            certificate_mode: FileMode::PUBLIC,
            private_key_mode: FileMode::PRIVATE,
        }
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the ledger path.
    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    /// Sets the certificate file mode.
    pub fn with_certificate_mode(mut self, mode: FileMode) -> Self {
        self.certificate_mode = mode;
        self
    }

    /// Sets the private key file mode.
    pub fn with_private_key_mode(mut self, mode: FileMode) -> Self {
        self.private_key_mode = mode;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
