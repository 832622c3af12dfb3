//! Unified cryptographic error type for S/MIME processing.
//!
//! Aggregates the errors of the underlying DER, RSA and cipher crates so
//! the full chain survives through `#[source]`.
//!
//! | Variant                | Meaning                                        |
//! |------------------------|------------------------------------------------|
//! | `Der`                  | ASN.1 structure could not be decoded/encoded   |
//! | `Rsa`                  | RSA sign/verify/decrypt primitive failed       |
//! | `Ecdsa`                | ECDSA signing primitive failed                 |
//! | `Key`                  | key material could not be parsed              |
//! | `Cipher`               | symmetric decryption or tag check failed       |
//! | `UnsupportedAlgorithm` | algorithm outside the registry or unimplemented |
//! | `SignatureInvalid`     | signature did not verify                       |
//! | `DigestMismatch`       | signed messageDigest differs from the content  |
//! | `NoRecipient`          | no RecipientInfo addresses the local key       |
//! | `CertificateNotFound`  | signer certificate could not be resolved       |
//! | `Compression`          | zlib stream could not be inflated/deflated     |

use thiserror::Error;

/// Unified error type for all cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    // ═══════════════════════════════════════════════════════════════════════
    // Structural: the input bytes were not what the caller believed
    // ═══════════════════════════════════════════════════════════════════════
    /// ASN.1 DER error.
    #[error("DER: {0}")]
    Der(#[source] der::Error),

    /// Key material could not be parsed.
    #[error("Key: {0}")]
    Key(String),

    /// Compression stream error.
    #[error("Compression: {0}")]
    Compression(String),

    // ═══════════════════════════════════════════════════════════════════════
    // Verification: the operation ran and produced a negative answer
    // ═══════════════════════════════════════════════════════════════════════
    /// RSA primitive error.
    #[error("RSA: {0}")]
    Rsa(#[source] rsa::Error),

    /// ECDSA primitive error.
    #[error("ECDSA: {0}")]
    Ecdsa(#[source] p256::ecdsa::Error),

    /// Symmetric cipher error (bad padding, tag mismatch, bad key length).
    #[error("Cipher: {0}")]
    Cipher(String),

    /// Signature verification failed.
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// The messageDigest signed attribute does not match the content.
    #[error("Content digest does not match signed messageDigest")]
    DigestMismatch,

    /// None of the recipient infos address the supplied key.
    #[error("No matching recipient: {0}")]
    NoRecipient(String),

    /// Signer certificate not found.
    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    // ═══════════════════════════════════════════════════════════════════════
    // Capability: fixable by choosing another algorithm
    // ═══════════════════════════════════════════════════════════════════════
    /// Algorithm is not in the registry or has no backend.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<der::Error> for CryptoError {
    fn from(err: der::Error) -> Self {
        CryptoError::Der(err)
    }
}

impl From<rsa::Error> for CryptoError {
    fn from(err: rsa::Error) -> Self {
        CryptoError::Rsa(err)
    }
}

impl From<p256::ecdsa::Error> for CryptoError {
    fn from(err: p256::ecdsa::Error) -> Self {
        CryptoError::Ecdsa(err)
    }
}

impl From<rsa::pkcs8::Error> for CryptoError {
    fn from(err: rsa::pkcs8::Error) -> Self {
        CryptoError::Key(err.to_string())
    }
}

impl From<rsa::pkcs8::spki::Error> for CryptoError {
    fn from(err: rsa::pkcs8::spki::Error) -> Self {
        CryptoError::Key(err.to_string())
    }
}

impl From<aes_gcm::Error> for CryptoError {
    fn from(_: aes_gcm::Error) -> Self {
        CryptoError::Cipher("authenticated decryption failed".to_string())
    }
}

impl From<cbc::cipher::block_padding::UnpadError> for CryptoError {
    fn from(_: cbc::cipher::block_padding::UnpadError) -> Self {
        CryptoError::Cipher("invalid block padding".to_string())
    }
}

impl From<cbc::cipher::InvalidLength> for CryptoError {
    fn from(_: cbc::cipher::InvalidLength) -> Self {
        CryptoError::Cipher("invalid key or IV length".to_string())
    }
}
