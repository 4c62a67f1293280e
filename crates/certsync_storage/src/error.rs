//! Error types for storage operations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred while touching `path`.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The path does not name a file.
    #[error("invalid file path: {0}")]
    InvalidPath(PathBuf),
}

impl StorageError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns the path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::InvalidPath(path) => path,
        }
    }
}
