//! Ordered, case-insensitive header list.

use std::fmt;

use crate::error::{As2Error, Result};

/// Header block of a MIME part or HTTP message.
///
/// Names keep the spelling they were added with; lookups ignore case.
/// Insertion order is preserved because MIC computation over a signed part
/// must reproduce the header lines byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a header, keeping existing ones.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every `name` header with a single value, keeping the
    /// position of the first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(pos) => {
                self.entries[pos].1 = value;
                let mut idx = 0;
                self.entries.retain(|(n, _)| {
                    let keep = idx <= pos || !n.eq_ignore_ascii_case(&name);
                    idx += 1;
                    keep
                });
            },
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove every `name` header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Iterate `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a header block terminated by an empty line.
    ///
    /// Returns the headers and the offset of the first body byte. Folded
    /// continuation lines are unfolded with a single space. Input without
    /// an empty line is treated as headers only.
    pub fn parse(raw: &[u8]) -> Result<(Self, usize)> {
        let mut headers = Headers::new();
        let mut pos = 0;

        while pos < raw.len() {
            let (line, next) = next_line(raw, pos);
            pos = next;
            if line.is_empty() {
                return Ok((headers, pos));
            }
            let line = String::from_utf8_lossy(line);
            if line.starts_with([' ', '\t']) {
                let (_, value) = headers.entries.last_mut().ok_or_else(|| {
                    As2Error::Mime("continuation line before first header".to_string())
                })?;
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| As2Error::Mime(format!("malformed header line: {line}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(As2Error::Mime(format!("empty header name: {line}")));
            }
            headers.add(name, value.trim());
        }

        Ok((headers, raw.len()))
    }

    /// Serialize as `Name: value\r\n` lines (no terminating empty line).
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (n, v) in iter {
            headers.add(n, v);
        }
        headers
    }
}

/// Line starting at `pos` without its terminator, and the offset after
/// the terminator. Accepts CRLF and bare LF.
fn next_line(raw: &[u8], pos: usize) -> (&[u8], usize) {
    match raw[pos..].iter().position(|&b| b == b'\n') {
        Some(idx) => {
            let end = pos + idx;
            let line_end = if end > pos && raw[end - 1] == b'\r' {
                end - 1
            } else {
                end
            };
            (&raw[pos..line_end], end + 1)
        },
        None => (&raw[pos..], raw.len()),
    }
}
