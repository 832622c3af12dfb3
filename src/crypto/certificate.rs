//! Certificate and key management.
//!
//! The pipeline only sees the [`CertificateManager`] trait. Key stores,
//! HSMs and PKI validation live behind it; [`InMemoryCertificateManager`]
//! is the implementation used by the CLI and by tests.

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use der::{DecodePem, Encode};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use super::algorithm::{oid, KeyAlgorithm, SigningAlgorithm};
use super::CryptoError;

/// Private key material. Debug output never shows the key.
#[derive(Clone)]
pub enum PrivateKey {
    /// RSA key (signing and key transport)
    Rsa(RsaPrivateKey),
    /// ECDSA key on NIST P-256
    P256(p256::ecdsa::SigningKey),
    /// ECDSA key on NIST P-384
    P384(p384::ecdsa::SigningKey),
}

impl PrivateKey {
    /// Wrap an RSA private key.
    pub fn new(key: RsaPrivateKey) -> Self {
        Self::Rsa(key)
    }

    /// Parse a PKCS#8 PEM private key (`BEGIN PRIVATE KEY`).
    ///
    /// RSA, P-256 and P-384 keys are recognised.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(Self::Rsa(key));
        }
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(Self::P256(key));
        }
        Ok(Self::P384(p384::ecdsa::SigningKey::from_pkcs8_pem(pem)?))
    }

    /// Key family.
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Rsa(_) => KeyAlgorithm::Rsa,
            PrivateKey::P256(_) | PrivateKey::P384(_) => KeyAlgorithm::Ecdsa,
        }
    }

    /// The RSA key, required for key transport.
    pub fn rsa(&self) -> Result<&RsaPrivateKey, CryptoError> {
        match self {
            PrivateKey::Rsa(key) => Ok(key),
            PrivateKey::P256(_) | PrivateKey::P384(_) => Err(CryptoError::UnsupportedAlgorithm(
                "key transport with an ECDSA key".to_string(),
            )),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// Public key taken from a certificate.
#[derive(Debug, Clone)]
pub enum PublicKey {
    /// RSA
    Rsa(RsaPublicKey),
    /// ECDSA on NIST P-256
    P256(p256::ecdsa::VerifyingKey),
    /// ECDSA on NIST P-384
    P384(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Key family.
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
            PublicKey::P256(_) | PublicKey::P384(_) => KeyAlgorithm::Ecdsa,
        }
    }
}

/// A certificate with its private key.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Certificate carrying the public half
    pub certificate: Certificate,
    /// Private half
    pub private_key: PrivateKey,
}

/// Outcome of trust validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustResult {
    /// Chain is trusted.
    Ok,
    /// Chain is trusted but something deserves attention (e.g. expiry).
    WithWarnings(Vec<String>),
    /// Chain is not trusted.
    Nok(String),
}

/// Certificate and key lookup service.
///
/// Calls are synchronous; timeout and retry policy belong to the
/// implementation.
pub trait CertificateManager: Send + Sync {
    /// Key pair stored under `alias`, or `None` when absent or when the
    /// password does not open it.
    fn key_pair(&self, alias: &str, password: Option<&str>) -> Option<KeyPair>;

    /// Certificate stored under `alias`.
    fn certificate(&self, alias: &str) -> Option<Certificate>;

    /// Certificate by issuer name and serial number.
    fn find_by_issuer_serial(&self, issuer: &Name, serial: &SerialNumber) -> Option<Certificate>;

    /// Certificate by subject key identifier.
    fn find_by_subject_key_id(&self, ski: &[u8]) -> Option<Certificate>;

    /// Validate a chain, leaf first.
    fn validate_trust(&self, chain: &[Certificate]) -> TrustResult;
}

// ============================================================================
// Certificate helpers
// ============================================================================

/// Parse a PEM certificate.
pub fn certificate_from_pem(pem: &str) -> Result<Certificate, CryptoError> {
    Ok(Certificate::from_pem(pem)?)
}

/// RSA public key of a certificate.
pub fn rsa_public_key(cert: &Certificate) -> Result<RsaPublicKey, CryptoError> {
    let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
    Ok(RsaPublicKey::from_public_key_der(&spki)?)
}

/// Public key of a certificate, RSA or ECDSA on P-256/P-384.
pub fn public_key(cert: &Certificate) -> Result<PublicKey, CryptoError> {
    let spki = cert.tbs_certificate.subject_public_key_info.to_der()?;
    match certificate_key_algorithm(cert) {
        Some(KeyAlgorithm::Rsa) => Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(&spki)?)),
        Some(KeyAlgorithm::Ecdsa) => {
            if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(&spki) {
                return Ok(PublicKey::P256(key));
            }
            Ok(PublicKey::P384(p384::ecdsa::VerifyingKey::from_public_key_der(&spki)?))
        },
        Some(KeyAlgorithm::Dsa) | None => Err(CryptoError::UnsupportedAlgorithm(format!(
            "public key {}",
            cert.tbs_certificate.subject_public_key_info.algorithm.oid
        ))),
    }
}

/// Key family of the certificate's subject public key.
pub fn certificate_key_algorithm(cert: &Certificate) -> Option<KeyAlgorithm> {
    let key_oid = cert.tbs_certificate.subject_public_key_info.algorithm.oid;
    if key_oid == oid::RSA_ENCRYPTION {
        Some(KeyAlgorithm::Rsa)
    } else if key_oid == oid::EC_PUBLIC_KEY {
        Some(KeyAlgorithm::Ecdsa)
    } else if key_oid == oid::DSA {
        Some(KeyAlgorithm::Dsa)
    } else {
        None
    }
}

/// Subject key identifier extension value, if present.
pub fn subject_key_id(cert: &Certificate) -> Option<Vec<u8>> {
    match cert.tbs_certificate.get::<SubjectKeyIdentifier>() {
        Ok(Some((_, ski))) => Some(ski.0.as_bytes().to_vec()),
        _ => None,
    }
}

/// Signature algorithm the certificate itself was signed with.
pub fn certificate_signing_algorithm(cert: &Certificate) -> Option<SigningAlgorithm> {
    SigningAlgorithm::from_oid(&cert.signature_algorithm.oid)
}

/// Whether `now` lies inside the certificate's validity window.
pub fn is_within_validity(cert: &Certificate, now: SystemTime) -> bool {
    let validity = &cert.tbs_certificate.validity;
    validity.not_before.to_system_time() <= now && now <= validity.not_after.to_system_time()
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Debug, Clone)]
struct StoreEntry {
    certificate: Certificate,
    private_key: Option<PrivateKey>,
    password: Option<String>,
}

/// Certificate store kept in memory.
///
/// Every certificate added is a trust anchor. Unknown certificates are
/// rejected unless [`with_trust_unknown`](Self::with_trust_unknown) is set,
/// in which case they pass with a warning.
#[derive(Debug, Default)]
pub struct InMemoryCertificateManager {
    entries: HashMap<String, StoreEntry>,
    trust_unknown: bool,
}

impl InMemoryCertificateManager {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept certificates that are not in the store, with a warning.
    pub fn with_trust_unknown(mut self, trust: bool) -> Self {
        self.trust_unknown = trust;
        self
    }

    /// Add a certificate under `alias`.
    pub fn add_certificate(&mut self, alias: impl Into<String>, certificate: Certificate) {
        self.entries.insert(
            alias.into(),
            StoreEntry {
                certificate,
                private_key: None,
                password: None,
            },
        );
    }

    /// Add a certificate with its private key. When `password` is set,
    /// `key_pair` only returns the pair to callers presenting it.
    pub fn add_key_pair(
        &mut self,
        alias: impl Into<String>,
        certificate: Certificate,
        private_key: PrivateKey,
        password: Option<String>,
    ) {
        self.entries.insert(
            alias.into(),
            StoreEntry {
                certificate,
                private_key: Some(private_key),
                password,
            },
        );
    }

    /// Add a PEM certificate.
    pub fn add_certificate_pem(
        &mut self,
        alias: impl Into<String>,
        pem: &str,
    ) -> Result<(), CryptoError> {
        let cert = certificate_from_pem(pem)?;
        self.add_certificate(alias, cert);
        Ok(())
    }

    /// Add a PEM certificate with its PKCS#8 PEM key.
    pub fn add_key_pair_pem(
        &mut self,
        alias: impl Into<String>,
        certificate_pem: &str,
        key_pem: &str,
        password: Option<String>,
    ) -> Result<(), CryptoError> {
        let cert = certificate_from_pem(certificate_pem)?;
        let key = PrivateKey::from_pkcs8_pem(key_pem)?;
        self.add_key_pair(alias, cert, key, password);
        Ok(())
    }

    /// Number of stored aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, cert: &Certificate) -> bool {
        self.entries.values().any(|e| e.certificate == *cert)
    }
}

impl CertificateManager for InMemoryCertificateManager {
    fn key_pair(&self, alias: &str, password: Option<&str>) -> Option<KeyPair> {
        let entry = self.entries.get(alias)?;
        if let Some(expected) = &entry.password {
            if password != Some(expected.as_str()) {
                tracing::warn!(alias, "key pair password rejected");
                return None;
            }
        }
        let private_key = entry.private_key.clone()?;
        Some(KeyPair {
            certificate: entry.certificate.clone(),
            private_key,
        })
    }

    fn certificate(&self, alias: &str) -> Option<Certificate> {
        self.entries.get(alias).map(|e| e.certificate.clone())
    }

    fn find_by_issuer_serial(&self, issuer: &Name, serial: &SerialNumber) -> Option<Certificate> {
        self.entries
            .values()
            .map(|e| &e.certificate)
            .find(|c| c.tbs_certificate.issuer == *issuer && c.tbs_certificate.serial_number == *serial)
            .cloned()
    }

    fn find_by_subject_key_id(&self, ski: &[u8]) -> Option<Certificate> {
        self.entries
            .values()
            .map(|e| &e.certificate)
            .find(|c| subject_key_id(c).as_deref() == Some(ski))
            .cloned()
    }

    fn validate_trust(&self, chain: &[Certificate]) -> TrustResult {
        let Some(leaf) = chain.first() else {
            return TrustResult::Nok("empty certificate chain".to_string());
        };

        let mut warnings = Vec::new();
        if !self.contains(leaf) {
            if !self.trust_unknown {
                return TrustResult::Nok(format!(
                    "certificate {} is not a trust anchor",
                    leaf.tbs_certificate.subject
                ));
            }
            warnings.push(format!(
                "certificate {} accepted without trust anchor",
                leaf.tbs_certificate.subject
            ));
        }
        if !is_within_validity(leaf, SystemTime::now()) {
            warnings.push(format!(
                "certificate {} is outside its validity period",
                leaf.tbs_certificate.subject
            ));
        }

        if warnings.is_empty() {
            TrustResult::Ok
        } else {
            TrustResult::WithWarnings(warnings)
        }
    }
}
