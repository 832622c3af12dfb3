//! MDN request options sent by the message originator.
//!
//! ```text
//! Disposition-Notification-To: mdn@example.com
//! Receipt-Delivery-Option: https://sender.example.com/as2/mdn
//! Disposition-Notification-Options: signed-receipt-protocol=optional, pkcs7-signature;
//!     signed-receipt-micalg=optional, sha-256, sha1
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::info::header;
use crate::error::{As2Error, Result};
use crate::mime::Headers;

/// Signature format for signed receipts.
pub const PKCS7_SIGNATURE: &str = "pkcs7-signature";

const SIGNED_RECEIPT_PROTOCOL: &str = "signed-receipt-protocol";
const SIGNED_RECEIPT_MICALG: &str = "signed-receipt-micalg";

/// Whether the sender wants a signed MDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureRequest {
    /// No signature requested
    #[default]
    Unsigned,
    /// Sign if possible
    Optional,
    /// Signature mandatory
    Required,
}

impl SignatureRequest {
    /// Whether a signature is requested at all.
    pub fn is_signed(self) -> bool {
        !matches!(self, SignatureRequest::Unsigned)
    }

    fn importance(self) -> &'static str {
        match self {
            SignatureRequest::Required => "required",
            _ => "optional",
        }
    }
}

/// Parsed MDN request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MdnRequestOptions {
    /// Signature requirement
    pub signature_request: SignatureRequest,
    /// Requested signature format (`pkcs7-signature`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_format: Option<String>,
    /// Digest algorithms for the MIC and signature, most preferred first,
    /// spelled as the sender spelled them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_hashing_algorithms: Vec<String>,
    /// Asynchronous delivery URL; absent means synchronous MDN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Value of `Disposition-Notification-To`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_to: Option<String>,
}

impl MdnRequestOptions {
    /// Unsigned synchronous request.
    pub fn sync(notification_to: impl Into<String>) -> Self {
        Self {
            notification_to: Some(notification_to.into()),
            ..Self::default()
        }
    }

    /// Request a signed receipt with the given digest preferences.
    pub fn signed(mut self, required: bool, algorithms: Vec<String>) -> Self {
        self.signature_request = if required {
            SignatureRequest::Required
        } else {
            SignatureRequest::Optional
        };
        self.signature_format = Some(PKCS7_SIGNATURE.to_string());
        self.preferred_hashing_algorithms = algorithms;
        self
    }

    /// Deliver the MDN asynchronously to `url`.
    pub fn with_reply_to(mut self, url: impl Into<String>) -> Self {
        self.reply_to = Some(url.into());
        self
    }

    /// Whether the MDN goes back in the HTTP response.
    pub fn is_sync(&self) -> bool {
        self.reply_to.is_none()
    }

    /// Parse the request from HTTP headers. `Ok(None)` when no MDN was
    /// requested.
    pub fn from_headers(headers: &Headers) -> Result<Option<Self>> {
        let Some(notification_to) = headers.get(header::DISPOSITION_NOTIFICATION_TO) else {
            return Ok(None);
        };

        let mut options = Self {
            notification_to: Some(notification_to.trim().to_string()),
            reply_to: headers
                .get(header::RECEIPT_DELIVERY_OPTION)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            ..Self::default()
        };

        if let Some(value) = headers.get(header::DISPOSITION_NOTIFICATION_OPTIONS) {
            options.apply_disposition_options(value)?;
        }
        Ok(Some(options))
    }

    fn apply_disposition_options(&mut self, value: &str) -> Result<()> {
        for param in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, values) = param.split_once('=').ok_or_else(|| {
                As2Error::InvalidHeader(format!(
                    "{}: parameter without value: {param}",
                    header::DISPOSITION_NOTIFICATION_OPTIONS
                ))
            })?;
            let mut values = values.split(',').map(str::trim).filter(|v| !v.is_empty()).peekable();
            let importance = match values.peek().map(|v| v.to_ascii_lowercase()) {
                Some(v) if v == "required" || v == "optional" => {
                    values.next();
                    Some(v)
                },
                _ => None,
            };
            let values: Vec<String> = values.map(str::to_string).collect();

            match name.trim().to_ascii_lowercase().as_str() {
                SIGNED_RECEIPT_PROTOCOL => {
                    let format = values.first().ok_or_else(|| {
                        As2Error::InvalidHeader(format!("{SIGNED_RECEIPT_PROTOCOL} without protocol"))
                    })?;
                    self.signature_format = Some(format.to_ascii_lowercase());
                    self.signature_request = match importance.as_deref() {
                        Some("required") => SignatureRequest::Required,
                        _ => SignatureRequest::Optional,
                    };
                },
                SIGNED_RECEIPT_MICALG => self.preferred_hashing_algorithms = values,
                other => {
                    tracing::debug!(parameter = other, "ignoring unknown disposition option");
                },
            }
        }
        Ok(())
    }

    /// `Disposition-Notification-Options` value, or `None` for unsigned
    /// requests.
    pub fn disposition_options(&self) -> Option<String> {
        if !self.signature_request.is_signed() {
            return None;
        }
        let importance = self.signature_request.importance();
        let format = self.signature_format.as_deref().unwrap_or(PKCS7_SIGNATURE);
        let mut value = format!("{SIGNED_RECEIPT_PROTOCOL}={importance}, {format}");
        if !self.preferred_hashing_algorithms.is_empty() {
            value.push_str(&format!(
                "; {SIGNED_RECEIPT_MICALG}={importance}, {}",
                self.preferred_hashing_algorithms.join(", ")
            ));
        }
        Some(value)
    }

    /// Write the request headers.
    pub fn write_headers(&self, headers: &mut Headers) {
        let to = self.notification_to.as_deref().unwrap_or("as2");
        headers.set(header::DISPOSITION_NOTIFICATION_TO, to);
        if let Some(options) = self.disposition_options() {
            headers.set(header::DISPOSITION_NOTIFICATION_OPTIONS, options);
        }
        if let Some(url) = &self.reply_to {
            headers.set(header::RECEIPT_DELIVERY_OPTION, url.as_str());
        }
    }
}

impl fmt::Display for SignatureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignatureRequest::Unsigned => "unsigned",
            SignatureRequest::Optional => "optional",
            SignatureRequest::Required => "required",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_no_request() {
        assert_eq!(MdnRequestOptions::from_headers(&Headers::new()).unwrap(), None);
    }

    #[test]
    fn test_parse_signed_async() {
        let h = headers(&[
            ("disposition-notification-to", "mdn@example.com"),
            ("Receipt-Delivery-Option", "https://sender/mdn"),
            (
                "Disposition-Notification-Options",
                "signed-receipt-protocol=required, pkcs7-signature; signed-receipt-micalg=required, sha-256, sha1",
            ),
        ]);
        let req = MdnRequestOptions::from_headers(&h).unwrap().unwrap();
        assert_eq!(req.signature_request, SignatureRequest::Required);
        assert_eq!(req.signature_format.as_deref(), Some("pkcs7-signature"));
        assert_eq!(req.preferred_hashing_algorithms, vec!["sha-256", "sha1"]);
        assert_eq!(req.reply_to.as_deref(), Some("https://sender/mdn"));
        assert!(!req.is_sync());
    }

    #[test]
    fn test_parse_unsigned_sync() {
        let h = headers(&[("Disposition-Notification-To", "x")]);
        let req = MdnRequestOptions::from_headers(&h).unwrap().unwrap();
        assert_eq!(req.signature_request, SignatureRequest::Unsigned);
        assert!(req.is_sync());
        assert!(req.disposition_options().is_none());
    }

    #[test]
    fn test_micalg_without_importance() {
        let h = headers(&[
            ("Disposition-Notification-To", "x"),
            (
                "Disposition-Notification-Options",
                "signed-receipt-protocol=optional,pkcs7-signature;signed-receipt-micalg=sha1,md5",
            ),
        ]);
        let req = MdnRequestOptions::from_headers(&h).unwrap().unwrap();
        assert_eq!(req.signature_request, SignatureRequest::Optional);
        assert_eq!(req.preferred_hashing_algorithms, vec!["sha1", "md5"]);
    }

    #[test]
    fn test_malformed_options() {
        let h = headers(&[
            ("Disposition-Notification-To", "x"),
            ("Disposition-Notification-Options", "signed-receipt-protocol"),
        ]);
        assert!(matches!(
            MdnRequestOptions::from_headers(&h),
            Err(As2Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_write_and_reparse() {
        let req = MdnRequestOptions::sync("as2@sender")
            .signed(false, vec!["sha-256".into(), "sha1".into()])
            .with_reply_to("https://sender/mdn");
        let mut h = Headers::new();
        req.write_headers(&mut h);
        assert_eq!(MdnRequestOptions::from_headers(&h).unwrap(), Some(req));
    }
}
