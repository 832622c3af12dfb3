//! AS2 error types.
//!
//! # Error Classification
//!
//! Every error belongs to one of four classes that decide how the pipeline
//! reacts to it:
//!
//! | Class           | Examples                                         | Inbound handling            |
//! |-----------------|--------------------------------------------------|-----------------------------|
//! | Configuration   | missing key pair, unknown algorithm name         | typed Error signal          |
//! | Cryptographic   | decrypt/verify/sign/encrypt failed               | typed Error signal          |
//! | Protocol        | malformed MIME or MDN, missing AS2 headers       | typed Error signal or 4xx   |
//! | Matching        | no P-Mode governs the message                    | FAILURE, typed Error signal |
//!
//! On the outbound side protocol and configuration errors abort the
//! transmission. Sending a broken message is never attempted.
//!
//! The `Crypto` variant preserves the full error chain via `#[source]`.

use thiserror::Error;

use crate::crypto::CryptoError;

/// AS2 processing errors.
#[derive(Error, Debug)]
pub enum As2Error {
    /// Configuration error (missing key material, unsupported algorithm).
    #[error("Config error: {0}")]
    Config(String),

    /// Cryptographic operation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),

    /// Malformed MIME structure.
    #[error("MIME error: {0}")]
    Mime(String),

    /// Malformed or missing AS2 header.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Malformed message disposition notification.
    #[error("Invalid MDN: {0}")]
    InvalidMdn(String),

    /// Message failed validation (e.g. missing party identifiers).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Signature digest algorithm differs from the declared `micalg`.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// No P-Mode could be selected for the message.
    #[error("Processing mode mismatch: {0}")]
    ProcessingModeMismatch(String),

    /// Network communication error.
    #[error("Network error: {0}")]
    Network(String),

    /// Server-side error.
    #[error("Server error: {0}")]
    Server(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error class used to pick failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fixable through configuration, without code change.
    Configuration,
    /// The cryptographic operation itself failed.
    Cryptographic,
    /// Malformed input or protocol violation.
    Protocol,
    /// No governing P-Mode.
    Matching,
    /// Transport, storage or serialization trouble outside the protocol.
    Infrastructure,
}

impl As2Error {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            As2Error::Config(_) => ErrorClass::Configuration,
            As2Error::Crypto(CryptoError::UnsupportedAlgorithm(_)) => ErrorClass::Configuration,
            As2Error::Crypto(_) => ErrorClass::Cryptographic,
            As2Error::Mime(_)
            | As2Error::InvalidHeader(_)
            | As2Error::InvalidMdn(_)
            | As2Error::Validation(_)
            | As2Error::Integrity(_) => ErrorClass::Protocol,
            As2Error::ProcessingModeMismatch(_) => ErrorClass::Matching,
            As2Error::Network(_) | As2Error::Server(_) | As2Error::Json(_) | As2Error::Io(_) => {
                ErrorClass::Infrastructure
            },
        }
    }

    /// Whether fixing configuration could make a retry succeed.
    pub fn is_configuration(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }
}

/// Result type alias for AS2 operations
pub type Result<T> = std::result::Result<T, As2Error>;

impl From<CryptoError> for As2Error {
    fn from(err: CryptoError) -> Self {
        As2Error::Crypto(err)
    }
}

impl From<reqwest::Error> for As2Error {
    fn from(err: reqwest::Error) -> Self {
        As2Error::Network(err.to_string())
    }
}

impl From<toml::de::Error> for As2Error {
    fn from(err: toml::de::Error) -> Self {
        As2Error::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for As2Error {
    fn from(err: base64::DecodeError) -> Self {
        As2Error::Mime(format!("Base64 decode error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            As2Error::Config("no key".into()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            As2Error::Crypto(CryptoError::SignatureInvalid("bad".into())).class(),
            ErrorClass::Cryptographic
        );
        assert_eq!(
            As2Error::Crypto(CryptoError::UnsupportedAlgorithm("IDEA".into())).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            As2Error::InvalidMdn("no disposition".into()).class(),
            ErrorClass::Protocol
        );
        assert_eq!(
            As2Error::ProcessingModeMismatch("none".into()).class(),
            ErrorClass::Matching
        );
    }

    #[test]
    fn test_crypto_error_source_preserved() {
        use std::error::Error as _;

        let err: As2Error = CryptoError::DigestMismatch.into();
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Crypto error"));
    }
}
