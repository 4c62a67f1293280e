//! etcd v3 JSON gateway messages.
//!
//! The gateway exposes the KV gRPC service as `POST /v3/kv/<method>` with
//! JSON bodies. Keys and values travel base64-encoded and 64-bit integers
//! are usually rendered as JSON strings, though some gateway versions emit
//! plain numbers; both are accepted here.
//!
//! Only the two calls certsync needs are modelled: `range` for a single key
//! and `put`.

use crate::error::{ProtocolError, ProtocolResult};
use crate::revision::{KvEntry, Revision};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Path of the range (get) call.
pub const RANGE_PATH: &str = "/v3/kv/range";
/// Path of the put call.
pub const PUT_PATH: &str = "/v3/kv/put";

/// Body of `POST /v3/kv/range` for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeRequest {
    /// Base64 key.
    pub key: String,
}

impl RangeRequest {
    /// Creates a request for exactly `key`.
    pub fn new(key: &str) -> Self {
        Self {
            key: STANDARD.encode(key),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Body of `POST /v3/kv/put`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PutRequest {
    /// Base64 key.
    pub key: String,
    /// Base64 value.
    pub value: String,
}

impl PutRequest {
    /// Creates a request storing `value` under `key`.
    pub fn new(key: &str, value: &[u8]) -> Self {
        Self {
            key: STANDARD.encode(key),
            value: STANDARD.encode(value),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl std::fmt::Debug for PutRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutRequest")
            .field("key", &self.key)
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// Response header common to all KV calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseHeader {
    /// Cluster identifier.
    #[serde(default, deserialize_with = "int64")]
    pub cluster_id: u64,
    /// Member that served the request.
    #[serde(default, deserialize_with = "int64")]
    pub member_id: u64,
    /// Store revision when the request was served.
    #[serde(default, deserialize_with = "int64")]
    pub revision: u64,
    /// Raft term.
    #[serde(default, deserialize_with = "int64")]
    pub raft_term: u64,
}

/// A stored key/value pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyValue {
    /// Base64 key.
    #[serde(default)]
    pub key: String,
    /// Revision of the key's creation.
    #[serde(default, deserialize_with = "int64")]
    pub create_revision: u64,
    /// Revision of the last modification.
    #[serde(default, deserialize_with = "int64")]
    pub mod_revision: u64,
    /// Number of writes since creation.
    #[serde(default, deserialize_with = "int64")]
    pub version: u64,
    /// Base64 value. Omitted by the gateway when empty.
    #[serde(default)]
    pub value: String,
}

/// Response of `POST /v3/kv/range`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RangeResponse {
    /// Response header.
    #[serde(default)]
    pub header: Option<ResponseHeader>,
    /// Matching pairs. Omitted by the gateway when nothing matched.
    #[serde(default)]
    pub kvs: Vec<KeyValue>,
    /// Number of matching keys.
    #[serde(default, deserialize_with = "int64")]
    pub count: u64,
}

impl RangeResponse {
    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Converts the first returned pair into a [`KvEntry`].
    ///
    /// Returns `Ok(None)` when the key does not exist.
    pub fn into_entry(self) -> ProtocolResult<Option<KvEntry>> {
        let Some(kv) = self.kvs.into_iter().next() else {
            return Ok(None);
        };

        let key = decode_base64("key", &kv.key)?;
        let value = decode_base64("value", &kv.value)?;
        Ok(Some(KvEntry::new(
            String::from_utf8_lossy(&key),
            Revision::new(kv.mod_revision),
            value,
        )))
    }
}

/// Response of `POST /v3/kv/put`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PutResponse {
    /// Response header; its revision is the revision of this write.
    #[serde(default)]
    pub header: Option<ResponseHeader>,
}

impl PutResponse {
    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Returns the revision created by the put.
    pub fn revision(&self) -> ProtocolResult<Revision> {
        self.header
            .as_ref()
            .map(|h| Revision::new(h.revision))
            .ok_or(ProtocolError::MissingField("header"))
    }
}

fn decode_base64(field: &'static str, text: &str) -> ProtocolResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|source| ProtocolError::Base64 { field, source })
}

fn int64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_request_base64_key() {
        let body = RangeRequest::new("/service/pg/tls").encode().unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"key":"L3NlcnZpY2UvcGcvdGxz"}"#
        );
    }

    #[test]
    fn put_request_base64_key_and_value() {
        let request = PutRequest::new("k1", b"{}");
        assert_eq!(request.key, "azE=");
        assert_eq!(request.value, "e30=");
    }

    #[test]
    fn range_response_with_string_integers() {
        let body = br#"{
            "header": {"cluster_id": "14841639068965178418", "member_id": "10276657743932975437",
                       "revision": "9", "raft_term": "2"},
            "kvs": [{"key": "azE=", "create_revision": "5", "mod_revision": "9",
                     "version": "3", "value": "aGVsbG8="}],
            "count": "1"
        }"#;
        let response = RangeResponse::decode(body).unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.header.as_ref().unwrap().revision, 9);

        let entry = response.into_entry().unwrap().unwrap();
        assert_eq!(entry.key, "k1");
        assert_eq!(entry.revision, Revision::new(9));
        assert_eq!(entry.value, b"hello");
    }

    #[test]
    fn range_response_with_numeric_integers() {
        let body = br#"{"kvs": [{"key": "azE=", "mod_revision": 12, "value": ""}], "count": 1}"#;
        let entry = RangeResponse::decode(body)
            .unwrap()
            .into_entry()
            .unwrap()
            .unwrap();
        assert_eq!(entry.revision, Revision::new(12));
        assert!(entry.value.is_empty());
    }

    #[test]
    fn range_response_without_kvs_is_not_found() {
        let body = br#"{"header": {"revision": "7"}}"#;
        let response = RangeResponse::decode(body).unwrap();
        assert_eq!(response.count, 0);
        assert!(response.into_entry().unwrap().is_none());
    }

    #[test]
    fn range_response_bad_base64() {
        let body = br#"{"kvs": [{"key": "azE=", "mod_revision": "1", "value": "%%%"}]}"#;
        let err = RangeResponse::decode(body).unwrap().into_entry().unwrap_err();
        assert!(matches!(err, ProtocolError::Base64 { field: "value", .. }));
    }

    #[test]
    fn range_response_bad_integer() {
        let body = br#"{"kvs": [{"key": "azE=", "mod_revision": "nine"}]}"#;
        assert!(matches!(
            RangeResponse::decode(body),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn put_response_revision() {
        let response = PutResponse::decode(br#"{"header": {"revision": "13"}}"#).unwrap();
        assert_eq!(response.revision().unwrap(), Revision::new(13));

        let headerless = PutResponse::decode(b"{}").unwrap();
        assert!(matches!(
            headerless.revision(),
            Err(ProtocolError::MissingField("header"))
        ));
    }
}
