//! Error types for payload and message decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The bytes are not the expected JSON document.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A base64 field could not be decoded.
    #[error("invalid base64 in field '{field}': {source}")]
    Base64 {
        /// Name of the offending field.
        field: &'static str,
        /// The underlying decode error.
        #[source]
        source: base64::DecodeError,
    },

    /// A revision is not a non-negative decimal integer.
    #[error("invalid revision '{0}'")]
    InvalidRevision(String),

    /// A field required by the caller is absent.
    #[error("missing field '{0}'")]
    MissingField(&'static str),
}
