//! Envelope state carried through the security pipeline.

use super::multipart;
use super::part::MimePart;
use crate::crypto::algorithm::{DigestAlgorithm, EncryptionAlgorithm};
use crate::error::{As2Error, Result};

/// Current representation of a message body.
///
/// `current` is the full entity as it stands after the transformations
/// applied so far. The main part is the innermost business content: the
/// first body part while a `multipart/signed` wrapper is still present,
/// the current entity otherwise.
#[derive(Debug, Clone)]
pub struct MimeEnvelope {
    current: MimePart,
    was_signed: bool,
    was_encrypted: bool,
    was_compressed: bool,
    signature_digest: Option<DigestAlgorithm>,
    encryption_algorithm: Option<EncryptionAlgorithm>,
}

impl MimeEnvelope {
    /// Wrap a received entity.
    pub fn new(current: MimePart) -> Self {
        Self {
            current,
            was_signed: false,
            was_encrypted: false,
            was_compressed: false,
            signature_digest: None,
            encryption_algorithm: None,
        }
    }

    /// Full current entity.
    pub fn current(&self) -> &MimePart {
        &self.current
    }

    /// Innermost business content.
    pub fn main_part(&self) -> Result<MimePart> {
        let content_type = self.current.content_type()?;
        if !content_type.is_signed() {
            return Ok(self.current.clone());
        }
        multipart::parse_parts(&self.current)?
            .into_iter()
            .next()
            .ok_or_else(|| As2Error::Mime("signed multipart without content".into()))
    }

    /// Replace the entity after decryption.
    pub fn decrypted(&mut self, content: MimePart, algorithm: EncryptionAlgorithm) {
        self.current = content;
        self.was_encrypted = true;
        self.encryption_algorithm = Some(algorithm);
    }

    /// Replace the entity after decompression.
    pub fn decompressed(&mut self, content: MimePart) {
        self.current = content;
        self.was_compressed = true;
    }

    /// Collapse the signed wrapper to its content.
    pub fn verified(&mut self, content: MimePart, digest: DigestAlgorithm) {
        self.current = content;
        self.was_signed = true;
        self.signature_digest = Some(digest);
    }

    /// Whether a signature was verified.
    pub fn was_signed(&self) -> bool {
        self.was_signed
    }

    /// Whether the body was decrypted.
    pub fn was_encrypted(&self) -> bool {
        self.was_encrypted
    }

    /// Whether the body was decompressed.
    pub fn was_compressed(&self) -> bool {
        self.was_compressed
    }

    /// Digest algorithm of the verified signature.
    pub fn signature_digest(&self) -> Option<DigestAlgorithm> {
        self.signature_digest
    }

    /// Algorithm the body was encrypted with.
    pub fn encryption_algorithm(&self) -> Option<EncryptionAlgorithm> {
        self.encryption_algorithm
    }

    /// MIC must cover the part headers when the message was signed or
    /// encrypted.
    pub fn mic_includes_headers(&self) -> bool {
        self.was_signed || self.was_encrypted
    }

    /// Consume into the current entity.
    pub fn into_current(self) -> MimePart {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::content_type::ContentType;

    #[test]
    fn test_main_part_of_plain() {
        let part = MimePart::new(&ContentType::new("text/plain"), "x");
        let envelope = MimeEnvelope::new(part.clone());
        assert_eq!(envelope.main_part().unwrap(), part);
        assert!(!envelope.mic_includes_headers());
    }

    #[test]
    fn test_main_part_of_signed() {
        let inner = MimePart::new(&ContentType::new("application/edi-x12"), "ISA*00");
        let sig = MimePart::new(&ContentType::new("application/pkcs7-signature"), "SIG");
        let signed = multipart::build(
            ContentType::new("multipart/signed").with_param("micalg", "sha-256"),
            &[inner.clone(), sig],
        );
        let mut envelope = MimeEnvelope::new(signed);
        assert_eq!(envelope.main_part().unwrap().to_bytes(), inner.to_bytes());

        envelope.verified(inner.clone(), DigestAlgorithm::Sha256);
        assert!(envelope.was_signed());
        assert!(envelope.mic_includes_headers());
        assert_eq!(envelope.signature_digest(), Some(DigestAlgorithm::Sha256));
        assert_eq!(envelope.main_part().unwrap(), inner);
    }
}
