//! Storage trait definition.

use crate::error::StorageResult;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Unix permission bits applied to a written file.
///
/// Ignored on platforms without unix permissions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(pub u32);

impl FileMode {
    /// World-readable (`0644`), used for certificates and the ledger.
    pub const PUBLIC: FileMode = FileMode(0o644);
    /// Owner-only (`0600`), used for private keys.
    pub const PRIVATE: FileMode = FileMode(0o600);

    /// Returns the raw permission bits.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self::PUBLIC
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMode({:#o})", self.0)
    }
}

/// A store of small, whole files addressed by path.
///
/// # Invariants
///
/// - `read` returns `Ok(None)` when the file does not exist
/// - `read` after a successful `write` returns exactly the written bytes
/// - `write` either replaces the whole file or leaves the previous content
///
/// # Implementors
///
/// - [`super::FileBackend`] - OS files
/// - [`super::InMemoryStore`] - for testing
pub trait FileStore: Send + Sync {
    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the file at `path` with `contents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written. The previous
    /// content, if any, is left in place.
    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()>;
}

impl<S: FileStore + ?Sized> FileStore for &S {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()> {
        (**self).write(path, contents, mode)
    }
}

impl<S: FileStore + ?Sized> FileStore for Arc<S> {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()> {
        (**self).write(path, contents, mode)
    }
}

impl<S: FileStore + ?Sized> FileStore for Box<S> {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()> {
        (**self).write(path, contents, mode)
    }
}
