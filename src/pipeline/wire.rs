//! HTTP-level shapes exchanged with the transport and server layers.

use http::StatusCode;

use crate::mime::part::{CONTENT_TRANSFER_ENCODING, CONTENT_TYPE};
use crate::mime::{Headers, MimePart};

/// A received HTTP request or response: headers plus raw body.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// HTTP headers
    pub headers: Headers,
    /// Entity body
    pub body: Vec<u8>,
}

impl InboundRequest {
    /// Request from headers and body.
    pub fn new(headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// MIME entity carried by the request: the `Content-*` headers and
    /// the body.
    pub fn entity(&self) -> MimePart {
        let headers: Headers = self
            .headers
            .iter()
            .filter(|(name, _)| name.to_ascii_lowercase().starts_with("content-"))
            .collect();
        MimePart::from_parts(headers, self.body.clone())
    }
}

/// An AS2 message ready for HTTP transmission.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Message-ID of the unit being sent
    pub message_id: String,
    /// Target URL; `None` when the message travels in an HTTP response
    pub url: Option<String>,
    /// HTTP headers, including the entity's `Content-*` headers
    pub headers: Headers,
    /// Entity body
    pub body: Vec<u8>,
}

impl OutboundMessage {
    /// Split `entity` into HTTP headers and body and add `headers`.
    pub fn from_entity(message_id: impl Into<String>, entity: &MimePart, mut headers: Headers) -> Self {
        for name in [CONTENT_TYPE, CONTENT_TRANSFER_ENCODING, "Content-Disposition"] {
            if let Some(value) = entity.headers().get(name) {
                headers.set(name, value);
            }
        }
        Self {
            message_id: message_id.into(),
            url: None,
            headers,
            body: entity.body().to_vec(),
        }
    }

    /// Set the target URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// HTTP response to a received message.
#[derive(Debug, Clone)]
pub struct As2Response {
    /// Status code
    pub status: StatusCode,
    /// Headers
    pub headers: Headers,
    /// Body
    pub body: Vec<u8>,
}

impl As2Response {
    /// 200 with an empty body.
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// 200 carrying a synchronous MDN.
    pub fn with_mdn(mdn: OutboundMessage) -> Self {
        Self {
            status: StatusCode::OK,
            headers: mdn.headers,
            body: mdn.body,
        }
    }

    /// Plain-text error response.
    pub fn error(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: Headers::new().with(CONTENT_TYPE, "text/plain"),
            body: text.into().into_bytes(),
        }
    }

    /// Whether the body carries an MDN.
    pub fn has_mdn(&self) -> bool {
        self.status == StatusCode::OK && !self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::ContentType;

    #[test]
    fn test_entity_keeps_content_headers_only() {
        let request = InboundRequest::new(
            Headers::new()
                .with("AS2-From", "SenderX")
                .with("content-type", "text/plain")
                .with("Content-Transfer-Encoding", "binary"),
            b"hello".to_vec(),
        );
        let entity = request.entity();
        assert_eq!(entity.headers().len(), 2);
        assert!(entity.content_type().unwrap().is("text/plain"));
        assert_eq!(entity.body(), b"hello");
    }

    #[test]
    fn test_outbound_from_entity() {
        let entity = MimePart::binary(&ContentType::new("application/edi-x12"), b"ISA*".to_vec());
        let message = OutboundMessage::from_entity("id@x", &entity, Headers::new().with("AS2-To", "B"))
            .with_url("http://localhost/as2");
        assert_eq!(message.headers.get("Content-Type"), Some("application/edi-x12"));
        assert_eq!(message.headers.get("Content-Transfer-Encoding"), Some("binary"));
        assert_eq!(message.body, b"ISA*");
        assert_eq!(message.url.as_deref(), Some("http://localhost/as2"));
    }
}
