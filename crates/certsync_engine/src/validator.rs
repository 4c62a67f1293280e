//! Credential validation.
//!
//! A fetched credential is only materialized after [`validate`] accepts it.
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. the certificate PEM holds a parseable X.509 certificate
//! 2. the key PEM holds a parseable PKCS#8 private key
//! 3. the current time lies within `[notBefore, notAfter]`, both inclusive
//! 4. the private key's public half equals the certificate's public key
//!
//! Only RSA and elliptic-curve keys on P-256 or P-384 are understood.
//! PKCS#1 (`RSA PRIVATE KEY`) and SEC1 (`EC PRIVATE KEY`) PEM blocks are not
//! accepted for the synchronized credential.

use pkcs8::{DecodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::traits::PublicKeyParts;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::public_key::PublicKey;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Result type for validation.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Why a credential was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No X.509 certificate could be parsed.
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// No PKCS#8 private key could be parsed.
    #[error("malformed private key: {0}")]
    MalformedKey(String),

    /// The certificate's `notAfter` has passed.
    #[error("certificate expired at {not_after}")]
    Expired {
        /// The certificate's `notAfter`.
        not_after: String,
    },

    /// The certificate's `notBefore` is still ahead.
    #[error("certificate not valid before {not_before}")]
    NotYetValid {
        /// The certificate's `notBefore`.
        not_before: String,
    },

    /// The private key does not belong to the certificate.
    #[error("certificate public key does not match private key")]
    KeyMismatch,

    /// The private key uses an algorithm the validator does not handle.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
}

/// The flat classification of a [`CredentialError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialErrorKind {
    /// See [`CredentialError::MalformedCertificate`].
    MalformedCertificate,
    /// See [`CredentialError::MalformedKey`].
    MalformedKey,
    /// See [`CredentialError::Expired`].
    Expired,
    /// See [`CredentialError::NotYetValid`].
    NotYetValid,
    /// See [`CredentialError::KeyMismatch`].
    KeyMismatch,
    /// See [`CredentialError::UnsupportedKeyType`].
    UnsupportedKeyType,
}

impl CredentialError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> CredentialErrorKind {
        match self {
            Self::MalformedCertificate(_) => CredentialErrorKind::MalformedCertificate,
            Self::MalformedKey(_) => CredentialErrorKind::MalformedKey,
            Self::Expired { .. } => CredentialErrorKind::Expired,
            Self::NotYetValid { .. } => CredentialErrorKind::NotYetValid,
            Self::KeyMismatch => CredentialErrorKind::KeyMismatch,
            Self::UnsupportedKeyType(_) => CredentialErrorKind::UnsupportedKeyType,
        }
    }
}

/// Named elliptic curves the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// NIST P-256 (secp256r1).
    P256,
    /// NIST P-384 (secp384r1).
    P384,
}

/// Key algorithms the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// RSA of any size.
    Rsa,
    /// ECDSA/ECDH key on a named curve.
    Ec(EcCurve),
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa => f.write_str("RSA"),
            KeyAlgorithm::Ec(EcCurve::P256) => f.write_str("EC P-256"),
            KeyAlgorithm::Ec(EcCurve::P384) => f.write_str("EC P-384"),
        }
    }
}

/// The comparable part of a public key.
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// RSA modulus, big-endian, without leading zero bytes.
    Rsa {
        /// The modulus `n`.
        modulus: Vec<u8>,
    },
    /// Affine coordinates of an EC point.
    Ec {
        /// The curve the point lies on.
        curve: EcCurve,
        /// X coordinate.
        x: Vec<u8>,
        /// Y coordinate.
        y: Vec<u8>,
    },
}

impl PublicKeyMaterial {
    /// The algorithm this key belongs to.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKeyMaterial::Rsa { .. } => KeyAlgorithm::Rsa,
            PublicKeyMaterial::Ec { curve, .. } => KeyAlgorithm::Ec(*curve),
        }
    }
}

impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicKeyMaterial::Rsa { modulus } => f
                .debug_struct("Rsa")
                .field("bits", &(modulus.len() * 8))
                .finish(),
            PublicKeyMaterial::Ec { curve, .. } => {
                f.debug_struct("Ec").field("curve", curve).finish()
            }
        }
    }
}

/// Human-readable facts about a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Start of the validity window.
    pub not_before: OffsetDateTime,
    /// End of the validity window.
    pub not_after: OffsetDateTime,
    /// Public key algorithm, if understood.
    pub key_algorithm: Option<KeyAlgorithm>,
    /// Lowercase hex SHA-256 of the DER encoding.
    pub fingerprint: String,
}

/// Validates a credential against the system clock.
///
/// Returns the key algorithm of the accepted pair.
pub fn validate(certificate_pem: &str, private_key_pem: &str) -> CredentialResult<KeyAlgorithm> {
    validate_at(certificate_pem, private_key_pem, SystemTime::now())
}

/// Validates a credential as of `now`.
pub fn validate_at(
    certificate_pem: &str,
    private_key_pem: &str,
    now: SystemTime,
) -> CredentialResult<KeyAlgorithm> {
    let cert_der = certificate_der(certificate_pem)?;
    let cert = parse_certificate(&cert_der)?;

    let key_der = PrivatePkcs8KeyDer::from_pem_slice(private_key_pem.as_bytes())
        .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;
    let private = private_key_material(key_der.secret_pkcs8_der())?;

    check_validity(&cert, now)?;

    let private = private?;
    let public = certificate_key_material(&cert, private.algorithm())?;
    if public != private {
        return Err(CredentialError::KeyMismatch);
    }
    Ok(private.algorithm())
}

/// Checks that a PKCS#8 key belongs to a DER certificate, ignoring the
/// validity window.
pub fn check_key_pair(certificate_der: &[u8], pkcs8_der: &[u8]) -> CredentialResult<KeyAlgorithm> {
    let cert = parse_certificate(certificate_der)?;
    let private = private_key_material(pkcs8_der)??;
    let public = certificate_key_material(&cert, private.algorithm())?;
    if public != private {
        return Err(CredentialError::KeyMismatch);
    }
    Ok(private.algorithm())
}

/// Returns the lowercase hex SHA-256 of the first certificate in `pem`.
pub fn certificate_fingerprint(certificate_pem: &str) -> CredentialResult<String> {
    Ok(fingerprint(&certificate_der(certificate_pem)?))
}

/// Parses the first certificate in `pem` and summarizes it.
pub fn describe_certificate(certificate_pem: &str) -> CredentialResult<CertificateSummary> {
    let der = certificate_der(certificate_pem)?;
    let cert = parse_certificate(&der)?;
    let validity = cert.validity();

    let key_algorithm = match cert.public_key().parsed() {
        Ok(PublicKey::RSA(_)) => Some(KeyAlgorithm::Rsa),
        Ok(PublicKey::EC(point)) => ec_curve_of_point(point.data()).map(KeyAlgorithm::Ec),
        _ => None,
    };

    Ok(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: validity.not_before.to_datetime(),
        not_after: validity.not_after.to_datetime(),
        key_algorithm,
        fingerprint: fingerprint(&der),
    })
}

fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn certificate_der(pem: &str) -> CredentialResult<CertificateDer<'static>> {
    CertificateDer::from_pem_slice(pem.as_bytes())
        .map_err(|e| CredentialError::MalformedCertificate(e.to_string()))
}

fn parse_certificate(der: &[u8]) -> CredentialResult<X509Certificate<'_>> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| CredentialError::MalformedCertificate(e.to_string()))?;
    Ok(cert)
}

fn check_validity(cert: &X509Certificate<'_>, now: SystemTime) -> CredentialResult<()> {
    let now = OffsetDateTime::from(now);
    let validity = cert.validity();

    if now > validity.not_after.to_datetime() {
        return Err(CredentialError::Expired {
            not_after: validity.not_after.to_string(),
        });
    }
    if now < validity.not_before.to_datetime() {
        return Err(CredentialError::NotYetValid {
            not_before: validity.not_before.to_string(),
        });
    }
    Ok(())
}

/// Parses a PKCS#8 document into its public key material.
///
/// The outer result fails on malformed input; the inner one carries
/// `UnsupportedKeyType`, which is only reported after the validity check.
fn private_key_material(
    der: &[u8],
) -> CredentialResult<CredentialResult<PublicKeyMaterial>> {
    let info = PrivateKeyInfo::try_from(der)
        .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;
    let algorithm = info.algorithm.oid;

    if algorithm == RSA_ENCRYPTION {
        let key = rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;
        return Ok(Ok(PublicKeyMaterial::Rsa {
            modulus: strip_leading_zeros(&key.n().to_bytes_be()).to_vec(),
        }));
    }

    if algorithm == EC_PUBLIC_KEY {
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;
        if curve == SECP256R1 {
            let key = p256::SecretKey::from_pkcs8_der(der)
                .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;
            return Ok(Ok(p256_material(&key.public_key())));
        }
        if curve == SECP384R1 {
            let key = p384::SecretKey::from_pkcs8_der(der)
                .map_err(|e| CredentialError::MalformedKey(e.to_string()))?;
            return Ok(Ok(p384_material(&key.public_key())));
        }
        return Ok(Err(CredentialError::UnsupportedKeyType(format!(
            "EC curve {curve}"
        ))));
    }

    Ok(Err(CredentialError::UnsupportedKeyType(algorithm.to_string())))
}

/// Extracts the certificate's public key in the shape of `expected`.
///
/// A key of another family or curve is a mismatch, not a parse error.
fn certificate_key_material(
    cert: &X509Certificate<'_>,
    expected: KeyAlgorithm,
) -> CredentialResult<PublicKeyMaterial> {
    let parsed = cert
        .public_key()
        .parsed()
        .map_err(|_| CredentialError::KeyMismatch)?;

    match (parsed, expected) {
        (PublicKey::RSA(rsa), KeyAlgorithm::Rsa) => Ok(PublicKeyMaterial::Rsa {
            modulus: strip_leading_zeros(rsa.modulus).to_vec(),
        }),
        (PublicKey::EC(point), KeyAlgorithm::Ec(EcCurve::P256)) => {
            p256::PublicKey::from_sec1_bytes(point.data())
                .map(|key| p256_material(&key))
                .map_err(|_| CredentialError::KeyMismatch)
        }
        (PublicKey::EC(point), KeyAlgorithm::Ec(EcCurve::P384)) => {
            p384::PublicKey::from_sec1_bytes(point.data())
                .map(|key| p384_material(&key))
                .map_err(|_| CredentialError::KeyMismatch)
        }
        _ => Err(CredentialError::KeyMismatch),
    }
}

fn p256_material(key: &p256::PublicKey) -> PublicKeyMaterial {
    use p256::elliptic_curve::sec1::ToEncodedPoint;
    let point = key.to_encoded_point(false);
    PublicKeyMaterial::Ec {
        curve: EcCurve::P256,
        x: point.x().map(|x| x.to_vec()).unwrap_or_default(),
        y: point.y().map(|y| y.to_vec()).unwrap_or_default(),
    }
}

fn p384_material(key: &p384::PublicKey) -> PublicKeyMaterial {
    use p384::elliptic_curve::sec1::ToEncodedPoint;
    let point = key.to_encoded_point(false);
    PublicKeyMaterial::Ec {
        curve: EcCurve::P384,
        x: point.x().map(|x| x.to_vec()).unwrap_or_default(),
        y: point.y().map(|y| y.to_vec()).unwrap_or_default(),
    }
}

fn ec_curve_of_point(sec1: &[u8]) -> Option<EcCurve> {
    if p256::PublicKey::from_sec1_bytes(sec1).is_ok() {
        Some(EcCurve::P256)
    } else if p384::PublicKey::from_sec1_bytes(sec1).is_ok() {
        Some(EcCurve::P384)
    } else {
        None
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
