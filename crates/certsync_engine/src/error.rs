//! Error types for the engines.

use crate::validator::CredentialError;
use certsync_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync and publish operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can end a pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// TLS material is unreadable or invalid, or the configuration is
    /// incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// The key does not exist in the store.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The key that was fetched.
        key: String,
    },

    /// The KV round trip exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The stored value is not a credential payload.
    #[error("malformed payload under {key}: {reason}")]
    MalformedPayload {
        /// The key that was fetched.
        key: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The fetched credential failed validation.
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] CredentialError),

    /// Writing a materialized file or the ledger failed.
    #[error("failed to persist {path}: {source}")]
    Persist {
        /// The file being written.
        path: PathBuf,
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },

    /// The ledger file exists but does not hold a revision.
    #[error("corrupt ledger at {path}: {content:?}")]
    CorruptLedger {
        /// The ledger file.
        path: PathBuf,
        /// What was found there.
        content: String,
    },

    /// A local input file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The store answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a storage error raised while persisting.
    pub fn persist(source: StorageError) -> Self {
        Self::Persist {
            path: source.path().to_path_buf(),
            source,
        }
    }

    /// Wraps a storage error raised while reading local state.
    pub fn read(source: StorageError) -> Self {
        match source {
            StorageError::Io { path, source } => Self::Io { path, source },
            StorageError::InvalidPath(path) => {
                Self::Config(format!("invalid file path: {}", path.display()))
            }
        }
    }

    /// Returns true if the next scheduled pass may succeed without operator
    /// action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Persist { .. } => true,
            _ => false,
        }
    }
}

impl From<certsync_protocol::ProtocolError> for SyncError {
    fn from(err: certsync_protocol::ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::CredentialError;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("certificate rejected").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::persist(StorageError::io(
            "tls.key",
            io::Error::new(io::ErrorKind::Other, "disk full")
        ))
        .is_retryable());

        assert!(!SyncError::KeyNotFound { key: "k1".into() }.is_retryable());
        assert!(!SyncError::Config("no CA".into()).is_retryable());
        assert!(!SyncError::InvalidCredential(CredentialError::KeyMismatch).is_retryable());
        assert!(!SyncError::CorruptLedger {
            path: ".last_version".into(),
            content: "abc".into()
        }
        .is_retryable());
    }

    #[test]
    fn persist_keeps_path() {
        let err = SyncError::persist(StorageError::io(
            "/out/tls.crt",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ));
        match &err {
            SyncError::Persist { path, .. } => assert_eq!(path, &PathBuf::from("/out/tls.crt")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("/out/tls.crt"));
    }

    #[test]
    fn error_display() {
        let err = SyncError::KeyNotFound {
            key: "/service/pg/tls".into(),
        };
        assert_eq!(err.to_string(), "key not found: /service/pg/tls");

        let err = SyncError::CorruptLedger {
            path: ".last_version".into(),
            content: "-1".into(),
        };
        assert!(err.to_string().contains("\"-1\""));
    }
}
