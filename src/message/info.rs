//! Generic AS2 message metadata and its HTTP header form.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mime::content_type::unquote;
use crate::mime::Headers;

/// AS2 HTTP header names.
pub mod header {
    /// Message identifier
    pub const MESSAGE_ID: &str = "Message-ID";
    /// Identifier of the message an MDN refers to
    pub const ORIGINAL_MESSAGE_ID: &str = "Original-Message-ID";
    /// RFC 5322 date
    pub const DATE: &str = "Date";
    /// Free text subject
    pub const SUBJECT: &str = "Subject";
    /// Sender AS2 name
    pub const AS2_FROM: &str = "AS2-From";
    /// Receiver AS2 name
    pub const AS2_TO: &str = "AS2-To";
    /// Original recipient of the message
    pub const ORIGINAL_RECIPIENT: &str = "Original-Recipient";
    /// Final recipient of the message
    pub const FINAL_RECIPIENT: &str = "Final-Recipient";
    /// AS2 protocol version
    pub const AS2_VERSION: &str = "AS2-Version";
    /// MIME version
    pub const MIME_VERSION: &str = "MIME-Version";
    /// Presence requests an MDN
    pub const DISPOSITION_NOTIFICATION_TO: &str = "Disposition-Notification-To";
    /// URL for asynchronous MDN delivery
    pub const RECEIPT_DELIVERY_OPTION: &str = "Receipt-Delivery-Option";
    /// Signed receipt parameters
    pub const DISPOSITION_NOTIFICATION_OPTIONS: &str = "Disposition-Notification-Options";
}

/// Metadata common to every AS2 message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessageInfo {
    /// Message-ID without angle brackets
    pub message_id: String,
    /// Message this one refers to (MDNs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_to_message_id: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Subject line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// AS2-From
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_party_id: Option<String>,
    /// AS2-To
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_party_id: Option<String>,
    /// Original-Recipient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_recipient: Option<String>,
    /// Final-Recipient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_recipient: Option<String>,
}

impl GenericMessageInfo {
    /// New metadata with the given id, stamped now.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            ref_to_message_id: None,
            timestamp: Utc::now().trunc_subsecs(0),
            subject: None,
            from_party_id: None,
            to_party_id: None,
            original_recipient: None,
            final_recipient: None,
        }
    }

    /// Set the sender.
    pub fn with_from(mut self, party: impl Into<String>) -> Self {
        self.from_party_id = Some(party.into());
        self
    }

    /// Set the receiver.
    pub fn with_to(mut self, party: impl Into<String>) -> Self {
        self.to_party_id = Some(party.into());
        self
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the referenced message.
    pub fn with_ref_to(mut self, message_id: impl Into<String>) -> Self {
        self.ref_to_message_id = Some(message_id.into());
        self
    }

    /// Parse from HTTP headers.
    ///
    /// A missing Message-ID is replaced by a generated one; an unparsable
    /// Date falls back to the current time. Both are logged.
    pub fn from_headers(headers: &Headers) -> Self {
        let message_id = match headers.get(header::MESSAGE_ID).map(strip_brackets) {
            Some(id) if !id.is_empty() => id,
            _ => {
                let generated = generate_message_id("as2-core");
                tracing::warn!(message_id = %generated, "message has no Message-ID, generated one");
                generated
            },
        };

        let timestamp = match headers.get(header::DATE) {
            Some(date) => DateTime::parse_from_rfc2822(date.trim())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|e| {
                    tracing::warn!(message_id = %message_id, date, error = %e, "unparsable Date header");
                    Utc::now().trunc_subsecs(0)
                }),
            None => Utc::now().trunc_subsecs(0),
        };

        Self {
            ref_to_message_id: headers.get(header::ORIGINAL_MESSAGE_ID).map(strip_brackets),
            timestamp,
            subject: headers.get(header::SUBJECT).map(str::to_string),
            from_party_id: headers.get(header::AS2_FROM).map(unquote_as2_name),
            to_party_id: headers.get(header::AS2_TO).map(unquote_as2_name),
            original_recipient: headers.get(header::ORIGINAL_RECIPIENT).map(strip_address_type),
            final_recipient: headers.get(header::FINAL_RECIPIENT).map(strip_address_type),
            message_id,
        }
    }

    /// Write the headers described by this record.
    pub fn write_headers(&self, headers: &mut Headers) {
        headers.set(header::MESSAGE_ID, format!("<{}>", self.message_id));
        if let Some(ref_to) = &self.ref_to_message_id {
            headers.set(header::ORIGINAL_MESSAGE_ID, format!("<{ref_to}>"));
        }
        headers.set(header::DATE, self.timestamp.to_rfc2822());
        if let Some(from) = &self.from_party_id {
            headers.set(header::AS2_FROM, quote_as2_name(from));
        }
        if let Some(to) = &self.to_party_id {
            headers.set(header::AS2_TO, quote_as2_name(to));
        }
        if let Some(subject) = &self.subject {
            headers.set(header::SUBJECT, subject.as_str());
        }
        if let Some(recipient) = &self.original_recipient {
            headers.set(header::ORIGINAL_RECIPIENT, format!("rfc822; {recipient}"));
        }
        if let Some(recipient) = &self.final_recipient {
            headers.set(header::FINAL_RECIPIENT, format!("rfc822; {recipient}"));
        }
    }

    /// Header form as a new list.
    pub fn to_headers(&self) -> Headers {
        let mut headers = Headers::new();
        self.write_headers(&mut headers);
        headers
    }
}

/// Generate a globally unique Message-ID (without brackets).
pub fn generate_message_id(domain: &str) -> String {
    format!("{}@{}", Uuid::new_v4(), domain)
}

/// Strip surrounding whitespace and angle brackets from a Message-ID.
pub fn strip_brackets(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
        .trim()
        .to_string()
}

/// Remove an `rfc822;` style address-type prefix.
pub(crate) fn strip_address_type(value: &str) -> String {
    match value.split_once(';') {
        Some((kind, address)) if !kind.trim().is_empty() && !kind.contains('"') => {
            address.trim().to_string()
        },
        _ => value.trim().to_string(),
    }
}

/// Quote an AS2 name when it contains spaces, quotes or backslashes.
pub fn quote_as2_name(name: &str) -> String {
    if name.chars().any(|c| c == ' ' || c == '"' || c == '\\') {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_string()
    }
}

/// Inverse of [`quote_as2_name`].
pub fn unquote_as2_name(value: &str) -> String {
    unquote(value.trim())
}
