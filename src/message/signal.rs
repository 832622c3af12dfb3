//! Message units: business messages and the Receipt / Error signals that
//! acknowledge them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::info::GenericMessageInfo;
use super::mdn_request::MdnRequestOptions;
use super::metadata::MdnMetadata;
use crate::mime::MimePart;

/// Severity of a disposition modifier or error entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Processing failed
    Failure,
    /// Processed with an error
    Error,
    /// Processed with a warning
    Warning,
}

impl Severity {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Failure => "failure",
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    /// Parse the wire spelling (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "failure" => Some(Severity::Failure),
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            _ => None,
        }
    }

    /// Header name used for the per-entry lines of an MDN.
    pub fn field_name(self) -> &'static str {
        match self {
            Severity::Failure => "Failure",
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local classification of an AS2 processing error.
///
/// Codes are stable but carry no protocol meaning beyond "generated during
/// AS2 processing"; anything without a dedicated kind maps to `AS2:0000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No key pair configured to decrypt with
    DecryptionConfiguration,
    /// Decryption operation failed
    DecryptionFailed,
    /// Decompression failed
    DecompressionFailed,
    /// Signature missing, invalid or untrusted
    AuthenticationFailed,
    /// Signature digest differs from the declared `micalg`
    IntegrityCheckFailed,
    /// Message security below what the agreement requires
    InsufficientSecurity,
    /// Required or well-formed header missing
    InvalidHeader,
    /// No P-Mode governs the message
    ProcessingModeMismatch,
    /// Content format not supported
    UnsupportedFormat,
    /// None of the requested MIC algorithms is supported
    UnsupportedMicAlgorithms,
    /// Unexpected processing error
    ProcessingError,
    /// Any other modifier text
    Other(String),
}

impl ErrorKind {
    /// Stable local code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::DecryptionConfiguration => "AS2:0101",
            ErrorKind::DecryptionFailed => "AS2:0102",
            ErrorKind::DecompressionFailed => "AS2:0103",
            ErrorKind::AuthenticationFailed => "AS2:0104",
            ErrorKind::IntegrityCheckFailed => "AS2:0105",
            ErrorKind::InsufficientSecurity => "AS2:0106",
            ErrorKind::InvalidHeader => "AS2:0201",
            ErrorKind::ProcessingModeMismatch => "AS2:0202",
            ErrorKind::UnsupportedFormat => "AS2:0203",
            ErrorKind::UnsupportedMicAlgorithms => "AS2:0204",
            ErrorKind::ProcessingError => "AS2:0001",
            ErrorKind::Other(_) => "AS2:0000",
        }
    }

    /// Disposition modifier text (RFC 4130 section 7.4.3).
    pub fn modifier_text(&self) -> &str {
        match self {
            ErrorKind::DecryptionConfiguration | ErrorKind::DecryptionFailed => "decryption-failed",
            ErrorKind::DecompressionFailed => "decompression-failed",
            ErrorKind::AuthenticationFailed => "authentication-failed",
            ErrorKind::IntegrityCheckFailed => "integrity-check-failed",
            ErrorKind::InsufficientSecurity => "insufficient-message-security",
            ErrorKind::UnsupportedFormat => "unsupported format",
            ErrorKind::UnsupportedMicAlgorithms => "unsupported MIC-algorithms",
            ErrorKind::ProcessingModeMismatch
            | ErrorKind::InvalidHeader
            | ErrorKind::ProcessingError => "unexpected-processing-error",
            ErrorKind::Other(text) => text,
        }
    }

    /// Classify a received modifier text.
    pub fn from_modifier_text(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "decryption-failed" => ErrorKind::DecryptionFailed,
            "decompression-failed" => ErrorKind::DecompressionFailed,
            "authentication-failed" => ErrorKind::AuthenticationFailed,
            "integrity-check-failed" => ErrorKind::IntegrityCheckFailed,
            "insufficient-message-security" => ErrorKind::InsufficientSecurity,
            "unsupported format" => ErrorKind::UnsupportedFormat,
            "unsupported mic-algorithms" => ErrorKind::UnsupportedMicAlgorithms,
            "unexpected-processing-error" => ErrorKind::ProcessingError,
            _ => ErrorKind::Other(text.trim().to_string()),
        }
    }

    /// Severity used when the error is reported in an MDN.
    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorKind::UnsupportedFormat | ErrorKind::UnsupportedMicAlgorithms => Severity::Failure,
            _ => Severity::Error,
        }
    }
}

/// One entry of an Error signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Classification
    pub kind: ErrorKind,
    /// Severity
    pub severity: Severity,
    /// Free text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Message in error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_to_message_id: Option<String>,
    /// Full MDN metadata, carried by the first entry only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<MdnMetadata>,
}

impl ErrorEntry {
    /// Entry with the kind's default severity.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            severity: kind.default_severity(),
            kind,
            description: None,
            ref_to_message_id: None,
            detail: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the referenced message.
    pub fn with_ref_to(mut self, message_id: Option<String>) -> Self {
        self.ref_to_message_id = message_id;
        self
    }

    /// Stable code of the kind.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// A business document.
#[derive(Debug, Clone)]
pub struct UserMessage {
    /// Header metadata
    pub info: GenericMessageInfo,
    /// Governing P-Mode
    pub pmode_id: Option<String>,
    /// Business content
    pub payload: MimePart,
    /// Receipt requested by the sender (inbound) or to request (outbound)
    pub mdn_request: Option<MdnRequestOptions>,
}

/// Positive acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Header metadata; `ref_to_message_id` names the acknowledged message
    pub info: GenericMessageInfo,
    /// Governing P-Mode
    pub pmode_id: Option<String>,
    /// MDN metadata
    pub content: Option<MdnMetadata>,
}

/// Negative acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSignal {
    /// Header metadata; `ref_to_message_id` names the message in error
    pub info: GenericMessageInfo,
    /// Governing P-Mode
    pub pmode_id: Option<String>,
    /// Error entries, first one carrying the MDN metadata
    pub errors: Vec<ErrorEntry>,
}

impl ErrorSignal {
    /// Whether every entry is a warning.
    pub fn is_warning_only(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(|e| e.severity == Severity::Warning)
    }

    /// Metadata of the first entry.
    pub fn metadata(&self) -> Option<&MdnMetadata> {
        self.errors.first().and_then(|e| e.detail.as_ref())
    }
}

/// Any message unit handled by the pipeline.
#[derive(Debug, Clone)]
pub enum MessageUnit {
    /// Business document
    User(UserMessage),
    /// Positive acknowledgement
    Receipt(Receipt),
    /// Negative acknowledgement
    Error(ErrorSignal),
}

impl MessageUnit {
    /// Header metadata.
    pub fn info(&self) -> &GenericMessageInfo {
        match self {
            MessageUnit::User(m) => &m.info,
            MessageUnit::Receipt(r) => &r.info,
            MessageUnit::Error(e) => &e.info,
        }
    }

    /// Message-ID.
    pub fn message_id(&self) -> &str {
        &self.info().message_id
    }

    /// Referenced message, for signals.
    pub fn ref_to_message_id(&self) -> Option<&str> {
        self.info().ref_to_message_id.as_deref()
    }

    /// Governing P-Mode.
    pub fn pmode_id(&self) -> Option<&str> {
        match self {
            MessageUnit::User(m) => m.pmode_id.as_deref(),
            MessageUnit::Receipt(r) => r.pmode_id.as_deref(),
            MessageUnit::Error(e) => e.pmode_id.as_deref(),
        }
    }

    /// Set the governing P-Mode.
    pub fn set_pmode_id(&mut self, id: Option<String>) {
        match self {
            MessageUnit::User(m) => m.pmode_id = id,
            MessageUnit::Receipt(r) => r.pmode_id = id,
            MessageUnit::Error(e) => e.pmode_id = id,
        }
    }

    /// Receipts and errors are signals.
    pub fn is_signal(&self) -> bool {
        !matches!(self, MessageUnit::User(_))
    }

    /// Short type name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageUnit::User(_) => "user_message",
            MessageUnit::Receipt(_) => "receipt",
            MessageUnit::Error(_) => "error",
        }
    }
}
