//! File-based store for persistent state.

use crate::error::{StorageError, StorageResult};
use crate::store::{FileMode, FileStore};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

/// A store backed by OS files.
///
/// # Durability
///
/// Every write goes to a temporary file in the destination directory, is
/// flushed with `sync_all()`, and is then renamed over the destination.
/// Readers therefore see either the old file or the new one, never a
/// truncated mix. The directory entry itself is synced after the rename.
///
/// Parent directories are not created: a missing output directory is a
/// configuration error and surfaces as [`StorageError::Io`].
///
/// # Ownership
///
/// When the destination already exists, its owner and group are carried
/// over to the replacement so a consumer running as another user keeps
/// access. If they cannot be carried over (an unprivileged writer and a
/// foreign owner), the write fails and the old file stays in place. The
/// permission bits always come from the requested [`FileMode`].
///
/// # Example
///
/// ```no_run
/// use certsync_storage::{FileBackend, FileMode, FileStore};
/// use std::path::Path;
///
/// let store = FileBackend::new();
/// store.write(Path::new("/etc/patroni/tls.key"), b"...", FileMode::PRIVATE).unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FileBackend {
    sync_dir: bool,
}

impl FileBackend {
    /// Creates a file backend with full durability.
    #[must_use]
    pub fn new() -> Self {
        Self { sync_dir: true }
    }

    /// Skips syncing the parent directory after each rename.
    ///
    /// The file contents are still synced; only the rename may be lost on
    /// power failure.
    #[must_use]
    pub fn without_dir_sync(mut self) -> Self {
        self.sync_dir = false;
        self
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore for FileBackend {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8], mode: FileMode) -> StorageResult<()> {
        if path.file_name().is_none() {
            return Err(StorageError::InvalidPath(path.to_path_buf()));
        }
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let existing = fs::metadata(path).ok();

        let mut temp = tempfile::Builder::new()
            .prefix(".certsync")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| StorageError::io(dir, e))?;

        temp.write_all(contents)
            .map_err(|e| StorageError::io(temp.path(), e))?;
        if let Some(existing) = &existing {
            keep_owner(temp.as_file(), existing).map_err(|e| StorageError::io(path, e))?;
        }
        set_mode(temp.as_file(), mode).map_err(|e| StorageError::io(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io(temp.path(), e))?;

        temp.persist(path)
            .map_err(|e| StorageError::io(path, e.error))?;

        if self.sync_dir {
            sync_dir(dir).map_err(|e| StorageError::io(dir, e))?;
        }

        debug!(path = %path.display(), bytes = contents.len(), ?mode, "replaced file");
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: FileMode) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode.bits()))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: FileMode) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn keep_owner(file: &fs::File, existing: &fs::Metadata) -> std::io::Result<()> {
    use std::os::unix::fs::MetadataExt;
    let current = file.metadata()?;
    if current.uid() == existing.uid() && current.gid() == existing.gid() {
        return Ok(());
    }
    std::os::unix::fs::fchown(file, Some(existing.uid()), Some(existing.gid()))
}

#[cfg(not(unix))]
fn keep_owner(_file: &fs::File, _existing: &fs::Metadata) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
