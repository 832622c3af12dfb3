//! MDN metadata carried inside Receipt and Error signals.
//!
//! Signals pass through parts of message handling that know nothing about
//! AS2. Everything needed to render an MDN again (or to interpret one that
//! was received) travels in this document, serialized as JSON:
//!
//! ```json
//! {
//!   "disposition_mode": "automatic-action/MDN-sent-automatically",
//!   "disposition_type": "processed",
//!   "mic": { "digest": "qUqP5cyxm6YcTAhz05Hph5gvu9M=", "algorithm": "sha1" },
//!   "request": { "signature_request": "required", "preferred_hashing_algorithms": ["sha1"] }
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::mdn::{DispositionModifier, DispositionType, AUTOMATIC_MODE};
use super::mdn_request::MdnRequestOptions;
use crate::crypto::Mic;
use crate::error::Result;

/// Serializable subset of an MDN and the request it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdnMetadata {
    /// Action and sending mode
    pub disposition_mode: String,
    /// `processed` or `failed`
    pub disposition_type: DispositionType,
    /// Severity and text after the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<DispositionModifier>,
    /// `Failure:` lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    /// `Error:` lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// `Warning:` lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Received-Content-MIC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mic: Option<Mic>,
    /// Reporting user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_ua: Option<String>,
    /// Human-readable part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable_text: Option<String>,
    /// Original-Recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_recipient: Option<String>,
    /// Final-Recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_recipient: Option<String>,
    /// Request the MDN answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<MdnRequestOptions>,
}

impl Default for MdnMetadata {
    fn default() -> Self {
        Self {
            disposition_mode: AUTOMATIC_MODE.to_string(),
            disposition_type: DispositionType::Processed,
            modifier: None,
            failures: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            mic: None,
            reporting_ua: None,
            readable_text: None,
            original_recipient: None,
            final_recipient: None,
            request: None,
        }
    }
}

impl MdnMetadata {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// No modifier and no failure, error or warning lines.
    pub fn is_positive(&self) -> bool {
        self.disposition_type == DispositionType::Processed
            && self.modifier.is_none()
            && self.failures.is_empty()
            && self.errors.is_empty()
            && self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::mdn_request::SignatureRequest;
    use crate::message::signal::Severity;

    #[test]
    fn test_json_round_trip() {
        let metadata = MdnMetadata {
            disposition_type: DispositionType::Failed,
            modifier: Some(DispositionModifier {
                severity: Severity::Failure,
                text: "unsupported format".into(),
            }),
            warnings: vec!["late".into()],
            mic: Some(Mic::parse("qUqP5cyxm6YcTAhz05Hph5gvu9M=, sha1").unwrap()),
            reporting_ua: Some("as2-core".into()),
            request: Some(MdnRequestOptions {
                signature_request: SignatureRequest::Required,
                preferred_hashing_algorithms: vec!["sha1".into()],
                ..MdnRequestOptions::default()
            }),
            ..MdnMetadata::default()
        };
        let json = metadata.to_json().unwrap();
        assert_eq!(MdnMetadata::from_json(&json).unwrap(), metadata);
        assert!(!metadata.is_positive());
    }

    #[test]
    fn test_minimal_document() {
        let parsed = MdnMetadata::from_json(
            r#"{"disposition_mode":"manual-action/MDN-sent-manually","disposition_type":"processed"}"#,
        )
        .unwrap();
        assert!(parsed.is_positive());
        assert!(parsed.mic.is_none());
    }

    #[test]
    fn test_invalid_document() {
        assert!(MdnMetadata::from_json("{\"disposition_type\":\"maybe\"}").is_err());
    }
}
