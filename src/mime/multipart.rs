//! Multipart framing (RFC 2046 section 5.1).
//!
//! Splitting returns the raw bytes of each body part exactly as they
//! appear between delimiters. A detached signature covers those bytes,
//! so nothing is normalized here.

use uuid::Uuid;

use super::content_type::ContentType;
use super::part::MimePart;
use crate::error::{As2Error, Result};

/// Generate a fresh boundary string.
pub fn generate_boundary() -> String {
    format!("----=_Part_{}", Uuid::new_v4().simple())
}

/// Split a multipart body into raw part slices.
///
/// The CRLF (or LF) preceding each delimiter belongs to the delimiter,
/// not to the part. Preamble and epilogue are discarded. A missing close
/// delimiter ends the last part at the end of input.
pub fn split<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    if boundary.is_empty() {
        return Err(As2Error::Mime("empty multipart boundary".into()));
    }
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut pos = find_delimiter(body, delimiter, 0)
        .ok_or_else(|| As2Error::Mime(format!("boundary '{boundary}' not found")))?;
    let mut parts = Vec::new();

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }
        let start = skip_line(body, after);
        match find_delimiter(body, delimiter, start) {
            Some(next) => {
                parts.push(&body[start..line_break_start(body, start, next)]);
                pos = next;
            },
            None => {
                let mut end = body.len();
                while end > start && matches!(body[end - 1], b'\r' | b'\n') {
                    end -= 1;
                }
                parts.push(&body[start..end]);
                break;
            },
        }
    }

    if parts.is_empty() {
        return Err(As2Error::Mime("multipart without body parts".into()));
    }
    Ok(parts)
}

/// Parse the body parts of a multipart entity.
pub fn parse_parts(part: &MimePart) -> Result<Vec<MimePart>> {
    let content_type = part.content_type()?;
    let boundary = content_type
        .boundary()
        .ok_or_else(|| As2Error::Mime(format!("{} without boundary", content_type.mime_type())))?;
    split(part.body(), boundary)?
        .into_iter()
        .map(MimePart::parse)
        .collect()
}

/// Assemble a multipart entity. `content_type` must be a `multipart/*`
/// type; a boundary parameter is added.
pub fn build(content_type: ContentType, parts: &[MimePart]) -> MimePart {
    let boundary = generate_boundary();
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(b"--");
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.to_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"--");
    body.extend_from_slice(boundary.as_bytes());
    body.extend_from_slice(b"--\r\n");
    MimePart::new(&content_type.with_param("boundary", boundary), body)
}

/// Offset of the next delimiter line at or after `from`. A delimiter
/// only counts at the start of input or right after a line feed, and
/// must be followed by `--`, linear whitespace, a line break or the end
/// of input (RFC 2046 section 5.1.1).
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut search = from;
    while search + delimiter.len() <= body.len() {
        let idx = body[search..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)?;
        let at = search + idx;
        let line_start = at == 0 || body[at - 1] == b'\n';
        let rest = &body[at + delimiter.len()..];
        let terminated = rest.starts_with(b"--")
            || rest.first().map_or(true, |b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
        if line_start && terminated {
            return Some(at);
        }
        search = at + 1;
    }
    None
}

/// Offset just past the end of the line containing `pos`.
fn skip_line(body: &[u8], pos: usize) -> usize {
    body[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(body.len(), |idx| pos + idx + 1)
}

/// Start of the line break that precedes the delimiter at `delimiter_at`.
fn line_break_start(body: &[u8], start: usize, delimiter_at: usize) -> usize {
    let mut end = delimiter_at;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}
