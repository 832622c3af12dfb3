//! `Content-Type` values with parameters.

use std::fmt;
use std::str::FromStr;

use crate::error::{As2Error, Result};

/// MIME types that matter to the AS2 pipeline.
pub mod types {
    /// Detached-signature container
    pub const MULTIPART_SIGNED: &str = "multipart/signed";
    /// MDN container
    pub const MULTIPART_REPORT: &str = "multipart/report";
    /// Bare disposition notification
    pub const DISPOSITION_NOTIFICATION: &str = "message/disposition-notification";
    /// Encrypted or compressed content
    pub const PKCS7_MIME: &str = "application/pkcs7-mime";
    /// Legacy spelling of [`PKCS7_MIME`]
    pub const X_PKCS7_MIME: &str = "application/x-pkcs7-mime";
    /// Detached signature part
    pub const PKCS7_SIGNATURE: &str = "application/pkcs7-signature";
    /// Legacy spelling of [`PKCS7_SIGNATURE`]
    pub const X_PKCS7_SIGNATURE: &str = "application/x-pkcs7-signature";
    /// Human-readable MDN part
    pub const TEXT_PLAIN: &str = "text/plain";
}

/// Parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    mime_type: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Create a content type without parameters.
    pub fn new(mime_type: &str) -> Self {
        Self {
            mime_type: mime_type.trim().to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    /// Add or replace a parameter.
    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self
            .params
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.params.push((name.to_ascii_lowercase(), value)),
        }
        self
    }

    /// Lowercase `type/subtype`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Whether the type matches `mime_type` (case-insensitive).
    pub fn is(&self, mime_type: &str) -> bool {
        self.mime_type.eq_ignore_ascii_case(mime_type)
    }

    /// Parameter value, unquoted.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `boundary` parameter.
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    /// Whether this is `application/pkcs7-mime` with the given `smime-type`.
    pub fn is_smime(&self, smime_type: &str) -> bool {
        (self.is(types::PKCS7_MIME) || self.is(types::X_PKCS7_MIME))
            && self
                .param("smime-type")
                .is_some_and(|t| t.eq_ignore_ascii_case(smime_type))
    }

    /// Encrypted content.
    pub fn is_enveloped(&self) -> bool {
        self.is_smime("enveloped-data")
    }

    /// Compressed content.
    pub fn is_compressed(&self) -> bool {
        self.is_smime("compressed-data")
    }

    /// Detached-signature container.
    pub fn is_signed(&self) -> bool {
        self.is(types::MULTIPART_SIGNED)
    }

    /// MDN (either wrapped in a report or bare).
    pub fn is_mdn(&self) -> bool {
        self.is(types::MULTIPART_REPORT) || self.is(types::DISPOSITION_NOTIFICATION)
    }

    /// Signature part of a `multipart/signed`.
    pub fn is_signature(&self) -> bool {
        self.is(types::PKCS7_SIGNATURE) || self.is(types::X_PKCS7_SIGNATURE)
    }

    /// Parse a header value.
    pub fn parse(value: &str) -> Result<Self> {
        let mut pieces = split_params(value).into_iter();
        let mime_type = pieces.next().unwrap_or_default();
        let mime_type = mime_type.trim();
        let valid = mime_type
            .split_once('/')
            .is_some_and(|(t, s)| !t.trim().is_empty() && !s.trim().is_empty());
        if !valid {
            return Err(As2Error::Mime(format!("invalid content type: {value}")));
        }

        let mut content_type = ContentType::new(mime_type);
        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let Some((name, raw)) = piece.split_once('=') else {
                return Err(As2Error::Mime(format!("invalid parameter '{piece}' in {value}")));
            };
            content_type = content_type.with_param(name.trim(), unquote(raw.trim()));
        }
        Ok(content_type)
    }
}

impl FromStr for ContentType {
    type Err = As2Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type)?;
        for (name, value) in &self.params {
            if needs_quoting(value) {
                write!(f, "; {name}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))?;
            } else {
                write!(f, "; {name}={value}")?;
            }
        }
        Ok(())
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_ascii_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
}

/// Split on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            },
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            },
            ';' if !in_quotes => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

/// Remove surrounding quotes and backslash escapes.
pub(crate) fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signed() {
        let ct = ContentType::parse(
            "multipart/signed; protocol=\"application/pkcs7-signature\"; micalg=sha-256; boundary=\"----=_Part_1; x\"",
        )
        .unwrap();
        assert!(ct.is_signed());
        assert_eq!(ct.param("MICALG"), Some("sha-256"));
        assert_eq!(ct.boundary(), Some("----=_Part_1; x"));
    }

    #[test]
    fn test_smime_types() {
        let enc = ContentType::parse("application/pkcs7-mime; smime-type=enveloped-data; name=smime.p7m")
            .unwrap();
        assert!(enc.is_enveloped());
        assert!(!enc.is_compressed());

        let comp = ContentType::parse("Application/X-PKCS7-MIME; smime-type=\"compressed-data\"").unwrap();
        assert!(comp.is_compressed());
    }

    #[test]
    fn test_display_quotes_when_needed() {
        let ct = ContentType::new("multipart/report")
            .with_param("report-type", "disposition-notification")
            .with_param("boundary", "a b");
        assert_eq!(
            ct.to_string(),
            "multipart/report; report-type=disposition-notification; boundary=\"a b\""
        );
        assert_eq!(ContentType::parse(&ct.to_string()).unwrap(), ct);
    }

    #[test]
    fn test_invalid() {
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("textplain").is_err());
        assert!(ContentType::parse("text/plain; charset").is_err());
    }
}
