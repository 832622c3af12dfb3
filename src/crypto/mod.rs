//! S/MIME security layer for AS2.
//!
//! Every cryptographic transformation an AS2 message goes through lives
//! here, expressed over DER-encoded CMS structures (RFC 5652):
//!
//! | Operation            | CMS content type                 | Module         |
//! |----------------------|----------------------------------|----------------|
//! | Detached signature   | SignedData                       | [`signed`]     |
//! | CBC encryption       | EnvelopedData                    | [`enveloped`]  |
//! | GCM / CCM encryption | AuthEnvelopedData (RFC 5083)     | [`enveloped`]  |
//! | Compression          | CompressedData (RFC 3274, zlib)  | [`compressed`] |
//!
//! plus the algorithm registry, certificate access and MIC computation.
//!
//! # Ordering
//!
//! ```text
//! outbound:  content ─► sign ─► compress ─► encrypt ─► wire
//! inbound:   wire ─► decrypt ─► decompress ─► verify ─► decompress ─► content
//! ```
//!
//! Decompression runs twice inbound so that both "compress-then-sign" and
//! "sign-then-compress" senders are understood.
//!
//! # Backends
//!
//! Signatures: RSA PKCS#1 v1.5 and ECDSA on P-256 / P-384. DSA names
//! resolve in the registry but signing or verifying with them yields
//! [`CryptoError::UnsupportedAlgorithm`]. Key transport is RSA only
//! (PKCS#1 v1.5 or RSAES-OAEP).

pub mod algorithm;
pub mod asn1;
pub mod certificate;
pub mod compressed;
pub mod enveloped;
mod error;
pub mod mic;
pub mod signed;

pub use algorithm::{DigestAlgorithm, EncryptionAlgorithm, MicAlgorithmStyle, SigningAlgorithm};
pub use certificate::{
    CertificateManager, InMemoryCertificateManager, KeyPair, PrivateKey, PublicKey, TrustResult,
};
pub use enveloped::KeyReference;
pub use error::CryptoError;
pub use mic::Mic;
pub use signed::VerifiedSignature;
