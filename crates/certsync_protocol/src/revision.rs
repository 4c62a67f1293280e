//! Revisions and fetched KV entries.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A store-assigned write counter.
///
/// Revisions are only ever compared; `Revision::ZERO` means "nothing has
/// been synchronized yet" and is smaller than any revision a store hands
/// out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The revision of an empty ledger.
    pub const ZERO: Revision = Revision(0);

    /// Wraps a raw revision number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw revision number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next revision.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the decimal form written by [`Revision`]'s `Display`.
///
/// Only ASCII digits are accepted: no sign, no whitespace, no separators.
impl FromStr for Revision {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidRevision(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidRevision(s.to_string()))
    }
}

/// A key/value pair as returned by a KV `get`.
#[derive(Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// The key that was fetched.
    pub key: String,
    /// Revision of the last write to this key.
    pub revision: Revision,
    /// The stored bytes.
    pub value: Vec<u8>,
}

impl KvEntry {
    /// Creates an entry.
    pub fn new(key: impl Into<String>, revision: Revision, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            revision,
            value: value.into(),
        }
    }
}

// Values carry private keys; never print them.
impl fmt::Debug for KvEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvEntry")
            .field("key", &self.key)
            .field("revision", &self.revision)
            .field("value_len", &self.value.len())
            .finish()
    }
}
