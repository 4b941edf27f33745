//! Minimal HTTP/1.x message handling.
//!
//! Requests are parsed into a request-line value object plus the verbatim
//! remainder of the received buffer, so rewriting the target URL and
//! serializing back to wire format leaves every other byte of the request
//! untouched. Response heads are scanned only for the two headers the proxy
//! consults, `Content-Length` and `Content-Type`.

use crate::error::{ProxyError, Result};

/// An HTTP/1.x request split into its request line and the verbatim rest.
///
/// `rest` starts at the request line's terminator and carries the headers
/// and body exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: String,
    target: String,
    version: String,
    rest: Vec<u8>,
}

impl HttpRequest {
    /// Parses a request from one received buffer.
    ///
    /// Requires a complete, UTF-8 request line with method, target, and
    /// version tokens. The remainder of the buffer is kept as raw bytes.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let newline = buf.iter().position(|&b| b == b'\n').ok_or_else(|| {
            ProxyError::MalformedRequest("request line is not terminated".to_string())
        })?;
        // The terminator (CRLF or bare LF) stays with `rest` so that
        // serialization reproduces it as received.
        let line_end = if newline > 0 && buf[newline - 1] == b'\r' {
            newline - 1
        } else {
            newline
        };

        let line = std::str::from_utf8(&buf[..line_end]).map_err(|_| {
            ProxyError::MalformedRequest("request line is not valid UTF-8".to_string())
        })?;

        let mut tokens = line.split_whitespace();
        let method = tokens
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProxyError::MalformedRequest("missing method".to_string()))?;
        let target = tokens
            .next()
            .ok_or_else(|| ProxyError::MalformedRequest("missing target URL".to_string()))?;
        let version = tokens
            .next()
            .ok_or_else(|| ProxyError::MalformedRequest("missing version".to_string()))?;

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            rest: buf[line_end..].to_vec(),
        })
    }

    /// The request method token.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The target URL token.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The protocol version token.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Replaces the target URL, leaving everything else untouched.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    /// The value of the `Host` header with any port suffix removed, if the
    /// header is present.
    pub fn host(&self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.rest);
        let mut lines = rest.lines();
        // First entry is the empty remainder of the request-line terminator.
        lines.next();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("host") {
                    let value = value.trim();
                    let host = value.split(':').next().unwrap_or(value);
                    if host.is_empty() {
                        return None;
                    }
                    return Some(host.to_string());
                }
            }
        }
        None
    }

    /// Serializes back to wire format: the (possibly rewritten) request line
    /// followed by the verbatim remainder.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.method.len() + self.target.len() + self.version.len() + 2 + self.rest.len(),
        );
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(&self.rest);
        out
    }
}

/// Metadata scanned from the head of a buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseHead {
    /// Byte offset where the body starts (just past the blank line), or the
    /// buffer length when the blank line is not in the buffer.
    pub header_len: usize,
    /// Declared body size, when a `Content-Length` header is present.
    pub content_length: Option<usize>,
    /// Value of the `Content-Type` header, when present.
    pub content_type: Option<String>,
}

impl ResponseHead {
    /// Scans a buffered response for the headers the proxy consults.
    ///
    /// Tolerant by design: a response without a parsable head yields a
    /// default with `header_len` equal to the buffer length, which the
    /// streamer treats as "no body bytes buffered yet".
    pub fn parse(buf: &[u8]) -> Self {
        let header_len = find_header_end(buf).unwrap_or(buf.len());
        let head = String::from_utf8_lossy(&buf[..header_len]);

        let mut content_length = None;
        let mut content_type = None;
        for line in head.lines().skip(1) {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                let value = value.trim();
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.parse().ok();
                } else if name.trim().eq_ignore_ascii_case("content-type") {
                    content_type = Some(value.to_string());
                }
            }
        }

        Self {
            header_len,
            content_length,
            content_type,
        }
    }

    /// Returns true if the `Content-Type` indicates an HTML document.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| t.contains("text/html"))
    }
}

/// Extracts the HTML document portion of a buffered response: everything
/// from the opening `<html` tag onward.
///
/// Returns `None` when the response is not HTML or no opening tag occurs in
/// the buffered bytes.
pub fn html_document(buf: &[u8], head: &ResponseHead) -> Option<String> {
    if !head.is_html() {
        return None;
    }
    let body = String::from_utf8_lossy(&buf[head.header_len.min(buf.len())..]);
    body.find("<html").map(|idx| body[idx..].to_string())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .or_else(|| buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2))
}
