//! # certsync storage
//!
//! Whole-file storage abstraction for certsync.
//!
//! Everything certsync keeps on local disk is a small file that is always
//! read and replaced as a unit: the materialized certificate, the
//! materialized private key and the revision ledger. This crate provides
//! that primitive and nothing else.
//!
//! ## Design Principles
//!
//! - Stores are opaque: they never interpret the bytes they hold
//! - A missing file is a value (`Ok(None)`), not an error
//! - Every write replaces the whole file
//! - Must be `Send + Sync`
//!
//! ## Available Stores
//!
//! - [`FileBackend`] - OS files, each write is atomic (temp + rename)
//! - [`InMemoryStore`] - for tests, records every write
//!
//! ## Example
//!
//! ```rust
//! use certsync_storage::{FileMode, FileStore, InMemoryStore};
//! use std::path::Path;
//!
//! let store = InMemoryStore::new();
//! store.write(Path::new("tls.crt"), b"pem", FileMode::PUBLIC).unwrap();
//! assert_eq!(store.read(Path::new("tls.crt")).unwrap(), Some(b"pem".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryStore;
pub use store::{FileMode, FileStore};
