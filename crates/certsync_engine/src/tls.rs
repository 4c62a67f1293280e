//! Mutual-TLS client configuration for the KV connection.

use crate::error::{SyncError, SyncResult};
use crate::validator;
use rustls::crypto::ring;
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, InconsistentKeys, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Paths to the material that secures the KV connection.
///
/// Unrelated to the credential being synchronized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    /// CA bundle; the only trust anchors used.
    pub ca_cert_path: PathBuf,
    /// Client certificate chain, leaf first.
    pub client_cert_path: PathBuf,
    /// Client private key (PKCS#8, PKCS#1 or SEC1).
    pub client_key_path: PathBuf,
}

impl TlsMaterial {
    /// Creates a material description.
    pub fn new(
        ca_cert_path: impl Into<PathBuf>,
        client_cert_path: impl Into<PathBuf>,
        client_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ca_cert_path: ca_cert_path.into(),
            client_cert_path: client_cert_path.into(),
            client_key_path: client_key_path.into(),
        }
    }
}

/// Builds a rustls client configuration that trusts only the CA bundle and
/// presents the client certificate.
///
/// # Errors
///
/// `Config` if any file is unreadable, the bundle holds no certificate, or
/// the client key does not belong to the client certificate.
pub fn build_client_config(material: &TlsMaterial) -> SyncResult<ClientConfig> {
    let roots = load_roots(&material.ca_cert_path)?;
    let chain = load_chain(&material.client_cert_path)?;
    let key = load_key(&material.client_key_path)?;

    let provider = Arc::new(ring::default_provider());
    check_pair(&provider, &chain, &key)?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SyncError::Config(format!("TLS protocol setup failed: {e}")))?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| SyncError::Config(format!("invalid client identity: {e}")))?;

    debug!(
        ca = %material.ca_cert_path.display(),
        cert = %material.client_cert_path.display(),
        "TLS client configuration ready"
    );
    Ok(config)
}

fn read(path: &Path, what: &str) -> SyncResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| SyncError::Config(format!("cannot read {what} {}: {e}", path.display())))
}

fn load_roots(path: &Path) -> SyncResult<RootCertStore> {
    let pem = read(path, "CA bundle")?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SyncError::Config(format!("invalid CA bundle {}: {e}", path.display())))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(SyncError::Config(format!(
            "no usable CA certificate in {}",
            path.display()
        )));
    }
    debug!(added, ignored, "loaded CA bundle");
    Ok(roots)
}

fn load_chain(path: &Path) -> SyncResult<Vec<CertificateDer<'static>>> {
    let pem = read(path, "client certificate")?;
    let chain = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            SyncError::Config(format!("invalid client certificate {}: {e}", path.display()))
        })?;
    if chain.is_empty() {
        return Err(SyncError::Config(format!(
            "no certificate in {}",
            path.display()
        )));
    }
    Ok(chain)
}

fn load_key(path: &Path) -> SyncResult<PrivateKeyDer<'static>> {
    let pem = read(path, "client key")?;
    PrivateKeyDer::from_pem_slice(&pem)
        .map_err(|e| SyncError::Config(format!("invalid client key {}: {e}", path.display())))
}

fn check_pair(
    provider: &rustls::crypto::CryptoProvider,
    chain: &[CertificateDer<'static>],
    key: &PrivateKeyDer<'static>,
) -> SyncResult<()> {
    let signing_key = provider
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| SyncError::Config(format!("unusable client key: {e}")))?;

    match CertifiedKey::new(chain.to_vec(), signing_key).keys_match() {
        Ok(()) => Ok(()),
        Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => match key {
            PrivateKeyDer::Pkcs8(pkcs8) => {
                validator::check_key_pair(&chain[0], pkcs8.secret_pkcs8_der())
                    .map(|_| ())
                    .map_err(|e| SyncError::Config(format!("client key/certificate: {e}")))
            }
            _ => {
                debug!("client key correspondence not checkable, deferring to handshake");
                Ok(())
            }
        },
        Err(e) => Err(SyncError::Config(format!("client key/certificate: {e}"))),
    }
}
