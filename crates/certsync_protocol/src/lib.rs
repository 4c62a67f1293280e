//! # certsync protocol
//!
//! Wire payload and KV message types for certsync.
//!
//! This crate provides:
//! - [`Credential`], the JSON document stored as the KV value
//! - [`Revision`] and [`KvEntry`], the change-detection token and fetched entry
//! - [`etcd`], request/response bodies for the etcd v3 JSON gateway
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod credential;
mod error;
pub mod etcd;
mod revision;

pub use credential::Credential;
pub use error::{ProtocolError, ProtocolResult};
pub use revision::{KvEntry, Revision};
