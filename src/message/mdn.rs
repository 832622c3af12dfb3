//! Message Disposition Notifications (RFC 3798 / RFC 4130 section 7).
//!
//! An MDN on the wire:
//!
//! ```text
//! Content-Type: multipart/report; report-type=disposition-notification; boundary=...
//!
//! --boundary
//! Content-Type: text/plain
//!
//! The AS2 message with Message-ID <...> has been received and processed successfully.
//! --boundary
//! Content-Type: message/disposition-notification
//!
//! Reporting-UA: as2-core
//! Original-Recipient: rfc822; ReceiverY
//! Final-Recipient: rfc822; ReceiverY
//! Original-Message-ID: <...>
//! Disposition: automatic-action/MDN-sent-automatically; processed
//! Received-Content-MIC: qUqP5cyxm6YcTAhz05Hph5gvu9M=, sha1
//! --boundary--
//! ```
//!
//! [`MdnInfo`] is built by parsing such a report, or derived from a Receipt
//! (always positive) or an Error signal (always negative), and converts
//! back into a signal with [`MdnInfo::into_signal`].

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::info::{strip_address_type, strip_brackets, GenericMessageInfo};
use super::mdn_request::MdnRequestOptions;
use super::metadata::MdnMetadata;
use super::signal::{ErrorEntry, ErrorKind, ErrorSignal, MessageUnit, Receipt, Severity};
use crate::crypto::Mic;
use crate::error::{As2Error, Result};
use crate::mime::{multipart, types, ContentType, Headers, MimePart};

/// Disposition mode used for every MDN this crate sends.
pub const AUTOMATIC_MODE: &str = "automatic-action/MDN-sent-automatically";

/// MDN field names.
pub mod field {
    /// Reporting user agent
    pub const REPORTING_UA: &str = "Reporting-UA";
    /// Original recipient
    pub const ORIGINAL_RECIPIENT: &str = "Original-Recipient";
    /// Final recipient
    pub const FINAL_RECIPIENT: &str = "Final-Recipient";
    /// Acknowledged message
    pub const ORIGINAL_MESSAGE_ID: &str = "Original-Message-ID";
    /// Disposition
    pub const DISPOSITION: &str = "Disposition";
    /// MIC of the received content
    pub const RECEIVED_CONTENT_MIC: &str = "Received-Content-MIC";
}

lazy_static! {
    /// `mode ; type [/ severity [: text]]`
    static ref DISPOSITION_REGEX: Option<Regex> = Regex::new(
        r"(?is)^\s*([^;]*[^;\s])\s*;\s*([a-z-]+)\s*(?:/\s*([a-z-]+)\s*(?::\s*(.*?))?)?\s*$"
    )
    .ok();
}

/// Outcome reported by an MDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispositionType {
    /// Message was processed (possibly with errors or warnings)
    Processed,
    /// Message could not be processed
    Failed,
}

impl DispositionType {
    /// Wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            DispositionType::Processed => "processed",
            DispositionType::Failed => "failed",
        }
    }
}

impl fmt::Display for DispositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `severity: text` part of a disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionModifier {
    /// Severity
    pub severity: Severity,
    /// Free text (e.g. `decryption-failed`)
    pub text: String,
}

/// Parsed `Disposition` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Action and sending mode
    pub mode: String,
    /// Type
    pub disposition_type: DispositionType,
    /// Optional modifier
    pub modifier: Option<DispositionModifier>,
}

impl Disposition {
    /// Parse a `Disposition` value.
    pub fn parse(value: &str) -> Result<Self> {
        let regex = DISPOSITION_REGEX
            .as_ref()
            .ok_or_else(|| As2Error::InvalidMdn("disposition pattern unavailable".into()))?;
        let caps = regex
            .captures(value)
            .ok_or_else(|| As2Error::InvalidMdn(format!("malformed disposition: {value}")))?;

        let mode = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let disposition_type = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("processed") => DispositionType::Processed,
            Some("failed") => DispositionType::Failed,
            _ => {
                return Err(As2Error::InvalidMdn(format!("unknown disposition type: {value}")));
            },
        };
        let modifier = match caps.get(3) {
            Some(severity) => {
                let severity = Severity::parse(severity.as_str()).ok_or_else(|| {
                    As2Error::InvalidMdn(format!("unknown modifier severity: {value}"))
                })?;
                Some(DispositionModifier {
                    severity,
                    text: caps.get(4).map_or("", |m| m.as_str()).trim().to_string(),
                })
            },
            None => None,
        };

        Ok(Self {
            mode,
            disposition_type,
            modifier,
        })
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}", self.mode, self.disposition_type)?;
        if let Some(modifier) = &self.modifier {
            write!(f, "/{}", modifier.severity)?;
            if !modifier.text.is_empty() {
                write!(f, ": {}", modifier.text)?;
            }
        }
        Ok(())
    }
}

/// Full disposition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnInfo {
    /// Header metadata of the MDN itself; `ref_to_message_id` is the
    /// acknowledged message
    pub info: GenericMessageInfo,
    /// Action and sending mode
    pub disposition_mode: String,
    /// Processed or failed
    pub disposition_type: DispositionType,
    /// Modifier after the type
    pub modifier: Option<DispositionModifier>,
    /// `Failure:` lines
    pub failures: Vec<String>,
    /// `Error:` lines
    pub errors: Vec<String>,
    /// `Warning:` lines
    pub warnings: Vec<String>,
    /// Received-Content-MIC
    pub mic: Option<Mic>,
    /// Reporting user agent
    pub reporting_ua: Option<String>,
    /// Human-readable text
    pub readable_text: Option<String>,
}

impl MdnInfo {
    /// Positive MDN for `info`.
    pub fn processed(info: GenericMessageInfo) -> Self {
        Self {
            info,
            disposition_mode: AUTOMATIC_MODE.to_string(),
            disposition_type: DispositionType::Processed,
            modifier: None,
            failures: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            mic: None,
            reporting_ua: None,
            readable_text: None,
        }
    }

    /// No modifier and no failure, error or warning lines.
    pub fn is_positive(&self) -> bool {
        self.disposition_type == DispositionType::Processed
            && self.modifier.is_none()
            && self.failures.is_empty()
            && self.errors.is_empty()
            && self.warnings.is_empty()
    }

    /// Parsed `Disposition` triple.
    pub fn disposition(&self) -> Disposition {
        Disposition {
            mode: self.disposition_mode.clone(),
            disposition_type: self.disposition_type,
            modifier: self.modifier.clone(),
        }
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    /// Parse a received report. `info` comes from the HTTP headers; the
    /// report's own fields take precedence for the reference and
    /// recipients.
    pub fn parse(part: &MimePart, mut info: GenericMessageInfo) -> Result<Self> {
        let content_type = part.content_type()?;
        let (readable_text, machine) = if content_type.is(types::MULTIPART_REPORT) {
            let parts = multipart::parse_parts(part)
                .map_err(|e| As2Error::InvalidMdn(format!("unreadable report: {e}")))?;
            let machine_idx = parts
                .iter()
                .position(|p| {
                    p.content_type()
                        .is_ok_and(|ct| ct.is(types::DISPOSITION_NOTIFICATION))
                })
                .or_else(|| (parts.len() > 1).then_some(1))
                .ok_or_else(|| As2Error::InvalidMdn("report without disposition part".into()))?;
            let readable = (machine_idx != 0)
                .then(|| readable_part(&parts[0]))
                .flatten();
            (readable, parts[machine_idx].clone())
        } else if content_type.is(types::DISPOSITION_NOTIFICATION) {
            (None, part.clone())
        } else {
            return Err(As2Error::InvalidMdn(format!(
                "not a disposition notification: {}",
                content_type.mime_type()
            )));
        };

        let body = machine.decoded_body()?;
        let start = body
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(body.len());
        let (fields, _) = Headers::parse(&body[start..])
            .map_err(|e| As2Error::InvalidMdn(format!("malformed disposition fields: {e}")))?;

        let disposition = fields
            .get(field::DISPOSITION)
            .ok_or_else(|| As2Error::InvalidMdn("missing Disposition field".into()))
            .and_then(Disposition::parse)?;
        let mic = fields.get(field::RECEIVED_CONTENT_MIC).map(Mic::parse).transpose()?;

        if let Some(id) = fields.get(field::ORIGINAL_MESSAGE_ID) {
            info.ref_to_message_id = Some(strip_brackets(id));
        }
        if let Some(r) = fields.get(field::ORIGINAL_RECIPIENT) {
            info.original_recipient = Some(strip_address_type(r));
        }
        if let Some(r) = fields.get(field::FINAL_RECIPIENT) {
            info.final_recipient = Some(strip_address_type(r));
        }

        let lines = |name: &str| fields.get_all(name).map(str::to_string).collect::<Vec<_>>();
        Ok(Self {
            info,
            disposition_mode: disposition.mode,
            disposition_type: disposition.disposition_type,
            modifier: disposition.modifier,
            failures: lines(Severity::Failure.field_name()),
            errors: lines(Severity::Error.field_name()),
            warnings: lines(Severity::Warning.field_name()),
            mic,
            reporting_ua: fields.get(field::REPORTING_UA).map(str::to_string),
            readable_text,
        })
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Machine-readable field block.
    pub fn fields(&self) -> Headers {
        let mut fields = Headers::new();
        if let Some(ua) = &self.reporting_ua {
            fields.add(field::REPORTING_UA, ua.as_str());
        }
        if let Some(r) = &self.info.original_recipient {
            fields.add(field::ORIGINAL_RECIPIENT, format!("rfc822; {r}"));
        }
        if let Some(r) = self.info.final_recipient.as_ref().or(self.info.original_recipient.as_ref()) {
            fields.add(field::FINAL_RECIPIENT, format!("rfc822; {r}"));
        }
        if let Some(id) = &self.info.ref_to_message_id {
            fields.add(field::ORIGINAL_MESSAGE_ID, format!("<{id}>"));
        }
        fields.add(field::DISPOSITION, self.disposition().to_string());
        for (severity, lines) in self.lines() {
            for line in lines {
                fields.add(severity.field_name(), line.as_str());
            }
        }
        if let Some(mic) = &self.mic {
            fields.add(field::RECEIVED_CONTENT_MIC, mic.to_string());
        }
        fields
    }

    /// Human-readable text, synthesized when none was supplied.
    pub fn readable_text_or_default(&self) -> String {
        if let Some(text) = &self.readable_text {
            return text.clone();
        }
        let original = self.info.ref_to_message_id.as_deref().unwrap_or("unknown");
        if self.is_positive() {
            return format!(
                "The AS2 message with Message-ID <{original}> has been received and processed successfully.\r\n\
                 This is no guarantee that the message has been read or understood.\r\n"
            );
        }

        let mut text = match self.disposition_type {
            DispositionType::Failed => {
                format!("The AS2 message with Message-ID <{original}> could not be processed.\r\n")
            },
            DispositionType::Processed => format!(
                "The AS2 message with Message-ID <{original}> has been processed with the following issues.\r\n"
            ),
        };
        if let Some(modifier) = self.modifier.as_ref().filter(|m| !m.text.is_empty()) {
            text.push_str(&format!("{}: {}\r\n", modifier.severity.field_name(), modifier.text));
        }
        for (severity, lines) in self.lines() {
            for line in lines {
                text.push_str(&format!("{}: {line}\r\n", severity.field_name()));
            }
        }
        text
    }

    /// Render as `multipart/report`.
    pub fn to_mime(&self) -> MimePart {
        let readable = MimePart::new(
            &ContentType::new(types::TEXT_PLAIN).with_param("charset", "us-ascii"),
            self.readable_text_or_default(),
        )
        .with_header("Content-Transfer-Encoding", "7bit");

        let mut body = Vec::new();
        self.fields().write_to(&mut body);
        let machine = MimePart::new(&ContentType::new(types::DISPOSITION_NOTIFICATION), body)
            .with_header("Content-Transfer-Encoding", "7bit");

        multipart::build(
            ContentType::new(types::MULTIPART_REPORT).with_param("report-type", "disposition-notification"),
            &[readable, machine],
        )
    }

    fn lines(&self) -> [(Severity, &Vec<String>); 3] {
        [
            (Severity::Failure, &self.failures),
            (Severity::Error, &self.errors),
            (Severity::Warning, &self.warnings),
        ]
    }

    // ========================================================================
    // Signal mapping
    // ========================================================================

    /// Serializable subset, with the request it answers.
    pub fn metadata(&self, request: Option<&MdnRequestOptions>) -> MdnMetadata {
        MdnMetadata {
            disposition_mode: self.disposition_mode.clone(),
            disposition_type: self.disposition_type,
            modifier: self.modifier.clone(),
            failures: self.failures.clone(),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            mic: self.mic.clone(),
            reporting_ua: self.reporting_ua.clone(),
            readable_text: self.readable_text.clone(),
            original_recipient: self.info.original_recipient.clone(),
            final_recipient: self.info.final_recipient.clone(),
            request: request.cloned(),
        }
    }

    /// Rebuild from header metadata and an MDN metadata document.
    pub fn from_metadata(mut info: GenericMessageInfo, metadata: &MdnMetadata) -> Self {
        if info.original_recipient.is_none() {
            info.original_recipient.clone_from(&metadata.original_recipient);
        }
        if info.final_recipient.is_none() {
            info.final_recipient.clone_from(&metadata.final_recipient);
        }
        Self {
            info,
            disposition_mode: metadata.disposition_mode.clone(),
            disposition_type: metadata.disposition_type,
            modifier: metadata.modifier.clone(),
            failures: metadata.failures.clone(),
            errors: metadata.errors.clone(),
            warnings: metadata.warnings.clone(),
            mic: metadata.mic.clone(),
            reporting_ua: metadata.reporting_ua.clone(),
            readable_text: metadata.readable_text.clone(),
        }
    }

    /// Positive MDN for a Receipt. Any modifier or failure lines in the
    /// receipt's metadata are dropped.
    pub fn from_receipt(receipt: &Receipt, reporting_ua: &str) -> Self {
        let metadata = receipt.content.clone().unwrap_or_default();
        let mut mdn = Self::from_metadata(receipt.info.clone(), &metadata);
        mdn.disposition_type = DispositionType::Processed;
        mdn.modifier = None;
        mdn.failures.clear();
        mdn.errors.clear();
        mdn.warnings.clear();
        if mdn.reporting_ua.is_none() {
            mdn.reporting_ua = Some(reporting_ua.to_string());
        }
        mdn
    }

    /// Negative MDN for an Error signal.
    ///
    /// When the first entry carries MDN metadata it describes the whole
    /// disposition. Otherwise the first entry becomes the modifier and the
    /// remaining ones become failure, error or warning lines.
    pub fn from_error(signal: &ErrorSignal, reporting_ua: &str) -> Self {
        let mut mdn = match signal.metadata() {
            Some(metadata) => Self::from_metadata(signal.info.clone(), metadata),
            None => {
                let mut mdn = Self::processed(signal.info.clone());
                let mut entries = signal.errors.iter();
                let (severity, text) = entries.next().map_or(
                    (Severity::Error, ErrorKind::ProcessingError.modifier_text().to_string()),
                    |e| (e.severity, e.kind.modifier_text().to_string()),
                );
                if severity == Severity::Failure {
                    mdn.disposition_type = DispositionType::Failed;
                }
                mdn.modifier = Some(DispositionModifier { severity, text });
                for entry in entries {
                    let line = entry
                        .description
                        .clone()
                        .unwrap_or_else(|| entry.kind.modifier_text().to_string());
                    match entry.severity {
                        Severity::Failure => mdn.failures.push(line),
                        Severity::Error => mdn.errors.push(line),
                        Severity::Warning => mdn.warnings.push(line),
                    }
                }
                mdn
            },
        };
        if mdn.is_positive() {
            mdn.modifier = Some(DispositionModifier {
                severity: Severity::Error,
                text: ErrorKind::ProcessingError.modifier_text().to_string(),
            });
        }
        if mdn.reporting_ua.is_none() {
            mdn.reporting_ua = Some(reporting_ua.to_string());
        }
        mdn
    }

    /// Convert to a signal: a Receipt when positive, an Error otherwise.
    pub fn into_signal(self, pmode_id: Option<String>, request: Option<&MdnRequestOptions>) -> MessageUnit {
        let metadata = self.metadata(request);
        if self.is_positive() {
            return MessageUnit::Receipt(Receipt {
                info: self.info,
                pmode_id,
                content: Some(metadata),
            });
        }

        let ref_to = self.info.ref_to_message_id.clone();
        let first_line = self
            .failures
            .first()
            .or(self.errors.first())
            .or(self.warnings.first());
        let line_kind = first_line.map_or(ErrorKind::ProcessingError, |l| ErrorKind::from_modifier_text(l));
        let (severity, kind, description) = match &self.modifier {
            Some(m) if !m.text.is_empty() => (m.severity, ErrorKind::from_modifier_text(&m.text), Some(m.text.clone())),
            // Bare modifier: the severity is known, the cause comes from the lines.
            Some(m) => (m.severity, line_kind, first_line.cloned()),
            None => {
                let severity = if self.disposition_type == DispositionType::Failed {
                    Severity::Failure
                } else {
                    Severity::Error
                };
                (severity, line_kind, first_line.cloned())
            },
        };

        let mut errors = vec![ErrorEntry {
            kind,
            severity,
            description,
            ref_to_message_id: ref_to.clone(),
            detail: Some(metadata),
        }];
        for (severity, lines) in self.lines() {
            for line in lines {
                errors.push(ErrorEntry {
                    kind: ErrorKind::from_modifier_text(line),
                    severity,
                    description: Some(line.clone()),
                    ref_to_message_id: ref_to.clone(),
                    detail: None,
                });
            }
        }

        MessageUnit::Error(ErrorSignal {
            info: self.info,
            pmode_id,
            errors,
        })
    }
}

fn readable_part(part: &MimePart) -> Option<String> {
    match part.text() {
        Ok(text) => Some(text.trim_end().to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable MDN text part");
            None
        },
    }
}
