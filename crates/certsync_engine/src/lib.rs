//! # certsync engine
//!
//! Version-gated distribution of a TLS certificate/private-key pair through
//! a key-value store.
//!
//! This crate provides:
//! - TLS context builder for the mutual-TLS connection to the store
//! - Credential validator (PEM structure, validity window, key match)
//! - Version ledger (last synchronized revision on disk)
//! - Sync engine (fetch, compare, validate, persist, advance ledger)
//! - Publish engine (local files to the store)
//! - KV transport abstraction with an etcd v3 gateway implementation
//!
//! ## Architecture
//!
//! A pass is single-threaded and run-to-completion: at most one network
//! round trip, bounded by [`SyncConfig::request_timeout`], followed by a few
//! sequential file writes. Scheduling is left to cron or a systemd timer.
//!
//! ## Key Invariants
//!
//! - Equal or older revisions are never re-materialized
//! - Nothing is written unless the credential validated
//! - Files are written before the ledger; a failed pass never advances it
//! - A corrupt ledger stops the pass before any network traffic

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod ledger;
mod publish;
mod state;
mod tls;
mod transport;
pub mod validator;

pub use config::{
    SyncConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_LEDGER_PATH, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{SyncError, SyncResult};
pub use http::{BlockingHttpClient, EtcdTransport, HttpClient, HttpError};
pub use ledger::VersionLedger;
pub use publish::{PublishEngine, PublishReport};
pub use state::{SyncEngine, SyncOutcome, SyncPhase, SyncStats};
pub use tls::{build_client_config, TlsMaterial};
pub use transport::{InjectedFailure, KvStore, MemoryKvStore};
pub use validator::{
    validate, CertificateSummary, CredentialError, CredentialErrorKind, EcCurve, KeyAlgorithm,
};

pub use certsync_protocol::{Credential, KvEntry, Revision};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
