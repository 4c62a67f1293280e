//! # certsync testkit
//!
//! Test utilities for certsync.
//!
//! This crate provides:
//! - Literal PEM fixtures (RSA, P-256, P-384, Ed25519; valid, expired,
//!   not-yet-valid and mismatched combinations)
//! - Temporary directory helpers for on-disk passes
//! - A fault-injecting [`certsync_storage::FileStore`] wrapper
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use certsync_testkit::prelude::*;
//!
//! #[test]
//! fn sync_writes_files() {
//!     let dir = TestDir::new();
//!     let credential = valid_rsa_credential();
//!     // ... run a pass against dir.cert_path() / dir.key_path()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
