//! etcd v3 transport over the JSON gateway.
//!
//! The HTTP client is abstracted via a trait so the request mapping can be
//! tested without a network. [`BlockingHttpClient`] is the production
//! implementation on blocking `reqwest` with a preconfigured rustls client
//! configuration.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::KvStore;
use certsync_protocol::etcd::{
    PutRequest, PutResponse, RangeRequest, RangeResponse, PUT_PATH, RANGE_PATH,
};
use certsync_protocol::{KvEntry, Revision};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure of a single HTTP exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// No response within the deadline.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// Connection, TLS or I/O failure.
    #[error("{0}")]
    Transport(String),
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a JSON POST and returns the response body of a 2xx answer.
    fn post(&self, url: &str, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, HttpError>;
}

/// [`KvStore`] backed by the etcd v3 JSON gateway.
pub struct EtcdTransport<C: HttpClient> {
    /// Base URL of one etcd member (e.g. "https://etcd1:2379").
    endpoint: String,
    /// HTTP client implementation.
    client: C,
}

impl<C: HttpClient> EtcdTransport<C> {
    /// Creates a transport talking to `endpoint`.
    pub fn new(endpoint: impl Into<String>, client: C) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Returns the base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post_json(&self, path: &str, body: Vec<u8>, timeout: Duration) -> SyncResult<Vec<u8>> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%url, "etcd request");
        self.client.post(&url, body, timeout).map_err(|e| match e {
            HttpError::Timeout => SyncError::Timeout,
            HttpError::Status { status, body } if status >= 500 || status == 429 => {
                SyncError::transport_retryable(format!("HTTP {status}: {body}"))
            }
            HttpError::Status { status, body } => {
                SyncError::transport_fatal(format!("HTTP {status}: {body}"))
            }
            HttpError::Transport(message) => SyncError::transport_retryable(message),
        })
    }
}

impl<C: HttpClient> KvStore for EtcdTransport<C> {
    fn get(&self, key: &str, timeout: Duration) -> SyncResult<Option<KvEntry>> {
        let body = RangeRequest::new(key).encode()?;
        let response = self.post_json(RANGE_PATH, body, timeout)?;
        Ok(RangeResponse::decode(&response)?.into_entry()?)
    }

    fn put(&self, key: &str, value: &[u8], timeout: Duration) -> SyncResult<Revision> {
        let body = PutRequest::new(key, value).encode()?;
        let response = self.post_json(PUT_PATH, body, timeout)?;
        Ok(PutResponse::decode(&response)?.revision()?)
    }
}

/// Blocking `reqwest` client presenting a mutual-TLS identity.
pub struct BlockingHttpClient {
    inner: reqwest::blocking::Client,
}

impl BlockingHttpClient {
    /// Builds a client using `tls` for every connection.
    ///
    /// # Errors
    ///
    /// `Config` if the client cannot be constructed.
    pub fn new(tls: rustls::ClientConfig, config: &SyncConfig) -> SyncResult<Self> {
        let inner = reqwest::blocking::Client::builder()
            .use_preconfigured_tls(tls)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner })
    }
}

impl HttpClient for BlockingHttpClient {
    fn post(&self, url: &str, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, HttpError> {
        let response = self
            .inner
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Transport(e.to_string())
    }
}
