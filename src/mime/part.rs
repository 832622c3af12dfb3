//! A single MIME entity: header block plus body bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::content_type::ContentType;
use super::headers::Headers;
use crate::error::Result;

/// Header carrying the transfer encoding.
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
/// Header carrying the content type.
pub const CONTENT_TYPE: &str = "Content-Type";

const BASE64_LINE: usize = 76;

/// A MIME entity.
///
/// When parsed from bytes the original header block is kept so that
/// [`to_bytes`](Self::to_bytes) and [`header_bytes`](Self::header_bytes)
/// reproduce the input exactly; signature verification and MIC
/// computation depend on it. Any header mutation drops the raw block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    headers: Headers,
    raw_headers: Option<Vec<u8>>,
    body: Vec<u8>,
}

impl MimePart {
    /// Create a part with the given content type and (already encoded) body.
    pub fn new(content_type: &ContentType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: Headers::new().with(CONTENT_TYPE, content_type.to_string()),
            raw_headers: None,
            body: body.into(),
        }
    }

    /// Create a part from a header list and body.
    pub fn from_parts(headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            raw_headers: None,
            body: body.into(),
        }
    }

    /// Create a binary part with `Content-Transfer-Encoding: binary`.
    pub fn binary(content_type: &ContentType, body: impl Into<Vec<u8>>) -> Self {
        Self::new(content_type, body).with_header(CONTENT_TRANSFER_ENCODING, "binary")
    }

    /// Create a base64-encoded part, wrapped at 76 columns.
    pub fn base64(content_type: &ContentType, data: &[u8]) -> Self {
        let encoded = STANDARD.encode(data);
        let mut body = Vec::with_capacity(encoded.len() + encoded.len() / BASE64_LINE * 2 + 2);
        for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
            body.extend_from_slice(chunk);
            body.extend_from_slice(b"\r\n");
        }
        Self::new(content_type, body).with_header(CONTENT_TRANSFER_ENCODING, "base64")
    }

    /// Builder: set a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing existing values.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.raw_headers = None;
        self.headers.set(name, value);
    }

    /// Parse a complete MIME entity.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (headers, offset) = Headers::parse(raw)?;
        Ok(Self {
            headers,
            raw_headers: Some(raw[..offset].to_vec()),
            body: raw[offset..].to_vec(),
        })
    }

    /// Header list.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw (transfer-encoded) body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume into the raw body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Parsed `Content-Type`; `text/plain` when absent.
    pub fn content_type(&self) -> Result<ContentType> {
        match self.headers.get(CONTENT_TYPE) {
            Some(value) => ContentType::parse(value),
            None => Ok(ContentType::new(super::content_type::types::TEXT_PLAIN)),
        }
    }

    /// Lowercase transfer encoding, if declared.
    pub fn transfer_encoding(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TRANSFER_ENCODING)
            .map(|e| e.trim().to_ascii_lowercase())
    }

    /// Body with the transfer encoding removed.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding().as_deref() {
            Some("base64") => {
                let compact: Vec<u8> = self
                    .body
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                Ok(STANDARD.decode(compact)?)
            },
            Some("quoted-printable") => Ok(decode_quoted_printable(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Decoded body as text (lossy UTF-8).
    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.decoded_body()?).into_owned())
    }

    /// Header block including the empty separator line.
    pub fn header_bytes(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw_headers {
            return raw.clone();
        }
        let mut out = Vec::new();
        self.headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Full entity: header block, empty line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

/// Decode quoted-printable text (RFC 2045 section 6.7). Invalid escapes
/// are kept literally.
fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    fn hex(b: u8) -> Option<u8> {
        (b as char).to_digit(16).map(|d| d as u8)
    }

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        match input.get(i + 1..i + 3) {
            Some([b'\r', b'\n']) => i += 3,
            Some([b'\n', _]) => i += 2,
            Some(&[h, l]) => match (hex(h), hex(l)) {
                (Some(h), Some(l)) => {
                    out.push((h << 4) | l);
                    i += 3;
                },
                _ => {
                    out.push(b'=');
                    i += 1;
                },
            },
            _ => {
                if input.get(i + 1) == Some(&b'\n') {
                    i += 2;
                } else {
                    out.push(b'=');
                    i += 1;
                }
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_raw_headers() {
        let raw = b"Content-Type:   text/plain\r\nX-Folded: a\r\n b\r\n\r\nHello";
        let part = MimePart::parse(raw).unwrap();
        assert_eq!(part.to_bytes(), raw.to_vec());
        assert_eq!(part.headers().get("x-folded"), Some("a b"));
        assert_eq!(part.body(), b"Hello");
    }

    #[test]
    fn test_mutation_reserializes() {
        let part = MimePart::parse(b"Content-Type: text/plain\r\n\r\nx")
            .unwrap()
            .with_header("Content-Disposition", "attachment");
        assert_eq!(
            part.to_bytes(),
            b"Content-Type: text/plain\r\nContent-Disposition: attachment\r\n\r\nx".to_vec()
        );
    }

    #[test]
    fn test_base64_body() {
        let data = vec![7u8; 200];
        let part = MimePart::base64(&ContentType::new("application/octet-stream"), &data);
        assert!(part.body().split(|&b| b == b'\n').all(|line| line.len() <= BASE64_LINE + 1));
        assert_eq!(part.decoded_body().unwrap(), data);
    }

    #[test]
    fn test_quoted_printable() {
        let part = MimePart::parse(
            b"Content-Transfer-Encoding: quoted-printable\r\n\r\ncaf=C3=A9 soft=\r\nbreak =ZZ",
        )
        .unwrap();
        assert_eq!(part.text().unwrap(), "café softbreak =ZZ");
    }

    #[test]
    fn test_default_content_type() {
        let part = MimePart::parse(b"X-A: 1\r\n\r\n").unwrap();
        assert!(part.content_type().unwrap().is("text/plain"));
    }
}
