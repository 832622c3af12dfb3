//! Message Integrity Check.
//!
//! The MIC returned in an MDN proves which content the receiver saw. It is
//! a digest over the MIME-encoded bytes of the business part, including its
//! header lines when the original message was signed or encrypted.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::algorithm::{DigestAlgorithm, MicAlgorithmStyle, SigningAlgorithm};
use crate::error::{As2Error, Result};
use crate::mime::MimePart;

/// A computed or received MIC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mic {
    /// Base64 digest value
    pub digest: String,
    /// Digest algorithm name as written on the wire
    pub algorithm: String,
}

impl Mic {
    /// Compute the MIC of `part`.
    pub fn compute(
        part: &MimePart,
        include_headers: bool,
        digest: DigestAlgorithm,
        style: MicAlgorithmStyle,
    ) -> Self {
        let value = digest.digest(&mic_input(part, include_headers));
        Self {
            digest: STANDARD.encode(value),
            algorithm: digest.mic_name(style).to_string(),
        }
    }

    /// Parse a `Received-Content-MIC` value (`base64, algorithm`).
    pub fn parse(value: &str) -> Result<Self> {
        let (digest, algorithm) = value
            .split_once(',')
            .ok_or_else(|| As2Error::InvalidMdn(format!("malformed MIC: {value}")))?;
        let digest = digest.trim();
        let algorithm = algorithm.trim();
        if digest.is_empty() || algorithm.is_empty() || STANDARD.decode(digest).is_err() {
            return Err(As2Error::InvalidMdn(format!("malformed MIC: {value}")));
        }
        Ok(Self {
            digest: digest.to_string(),
            algorithm: algorithm.to_string(),
        })
    }

    /// Digest algorithm, when known to the registry.
    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        DigestAlgorithm::from_name(&self.algorithm)
    }

    /// Compare two MICs, ignoring the algorithm spelling.
    pub fn matches(&self, other: &Mic) -> bool {
        self.digest == other.digest
            && super::algorithm::same_digest(&self.algorithm, &other.algorithm)
    }
}

impl fmt::Display for Mic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.digest, self.algorithm)
    }
}

/// Bytes covered by the MIC: header lines with CRLF, an empty line, then
/// the encoded body; or the body alone.
pub fn mic_input(part: &MimePart, include_headers: bool) -> Vec<u8> {
    if include_headers {
        part.to_bytes()
    } else {
        part.body().to_vec()
    }
}

/// Pick the MIC digest algorithm.
///
/// Priority: the digest of the verified signature; then the first entry
/// of the sender's preference list the registry supports; then the digest
/// of the configured signing algorithm. The style follows the preference
/// entry when that decided, `default_style` otherwise.
pub fn select_algorithm(
    signature_digest: Option<DigestAlgorithm>,
    preferred: &[String],
    configured: Option<SigningAlgorithm>,
    default_style: MicAlgorithmStyle,
) -> Option<(DigestAlgorithm, MicAlgorithmStyle)> {
    let requested = preferred
        .iter()
        .find_map(|name| DigestAlgorithm::from_name(name).map(|d| (d, MicAlgorithmStyle::of(name))));

    if let Some(digest) = signature_digest {
        let style = requested.map_or(default_style, |(_, style)| style);
        return Some((digest, style));
    }
    if requested.is_some() {
        return requested;
    }
    configured.map(|s| (s.digest, default_style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::ContentType;

    fn part() -> MimePart {
        MimePart::new(&ContentType::new("text/plain"), "Hello AS2\r\n")
    }

    #[test]
    fn test_headers_change_digest() {
        let a = Mic::compute(&part(), true, DigestAlgorithm::Sha256, MicAlgorithmStyle::Rfc3851);
        let b = Mic::compute(&part(), false, DigestAlgorithm::Sha256, MicAlgorithmStyle::Rfc3851);
        assert_ne!(a.digest, b.digest);
        assert_eq!(a.algorithm, "sha256");
    }

    #[test]
    fn test_known_body_digest() {
        // sha1("Hello AS2\r\n")
        let expected = STANDARD.encode(DigestAlgorithm::Sha1.digest(b"Hello AS2\r\n"));
        let mic = Mic::compute(&part(), false, DigestAlgorithm::Sha1, MicAlgorithmStyle::Rfc5751);
        assert_eq!(mic.digest, expected);
        assert_eq!(mic.algorithm, "sha-1");
    }

    #[test]
    fn test_parse_and_display() {
        let mic = Mic::parse(" qUqP5cyxm6YcTAhz05Hph5gvu9M= , sha1").unwrap();
        assert_eq!(mic.to_string(), "qUqP5cyxm6YcTAhz05Hph5gvu9M=, sha1");
        assert_eq!(mic.digest_algorithm(), Some(DigestAlgorithm::Sha1));
        assert!(Mic::parse("nocomma").is_err());
        assert!(Mic::parse("!!!, sha1").is_err());
    }

    #[test]
    fn test_matches_ignores_spelling() {
        let a = Mic::parse("AAAA, sha-256").unwrap();
        let b = Mic::parse("AAAA, SHA256").unwrap();
        assert!(a.matches(&b));
    }

    #[test]
    fn test_algorithm_priority() {
        let prefs = vec!["unknown".to_string(), "sha-384".to_string(), "sha1".to_string()];
        let configured = Some(SigningAlgorithm::rsa(DigestAlgorithm::Sha512));

        assert_eq!(
            select_algorithm(Some(DigestAlgorithm::Sha1), &prefs, configured, MicAlgorithmStyle::Rfc3851),
            Some((DigestAlgorithm::Sha1, MicAlgorithmStyle::Rfc5751))
        );
        assert_eq!(
            select_algorithm(None, &prefs, configured, MicAlgorithmStyle::Rfc3851),
            Some((DigestAlgorithm::Sha384, MicAlgorithmStyle::Rfc5751))
        );
        assert_eq!(
            select_algorithm(None, &[], configured, MicAlgorithmStyle::Rfc3851),
            Some((DigestAlgorithm::Sha512, MicAlgorithmStyle::Rfc3851))
        );
        assert_eq!(select_algorithm(None, &[], None, MicAlgorithmStyle::Rfc3851), None);
    }
}
