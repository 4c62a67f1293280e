//! The credential payload stored under a KV key.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A certificate and its private key, both PEM text.
///
/// Serialized as `{"certificate": "...", "privateKey": "..."}`. Unknown
/// fields are ignored on decode; both fields are required.
///
/// Construction does not validate anything. Whether the two halves belong
/// together and whether the certificate is currently valid is decided by
/// the engine's validator.
///
/// Both strings are wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    /// PEM-encoded X.509 certificate, including BEGIN/END lines.
    pub certificate: String,
    /// PEM-encoded private key, including BEGIN/END lines.
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl Credential {
    /// Creates a credential from PEM text.
    pub fn new(certificate: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            certificate: certificate.into(),
            private_key: private_key.into(),
        }
    }

    /// Creates a credential from raw file contents.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; publishing does not
    /// judge the material it is given.
    pub fn from_bytes(certificate: &[u8], private_key: &[u8]) -> Self {
        Self::new(
            String::from_utf8_lossy(certificate),
            String::from_utf8_lossy(private_key),
        )
    }

    /// Encodes to the JSON wire format.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from the JSON wire format.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("private_key", &"<redacted>")
            .finish()
    }
}
