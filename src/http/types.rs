//! HTTP Request Types
//!
//! This module defines the request-side data model: the request method,
//! the protocol version and the [`HttpRequest`] record that the parser
//! fills in as bytes arrive.
//!
//! ## Wire Format
//!
//! ```text
//! METHOD SP PATH[?QUERY] SP HTTP/1.{0|1} CRLF
//! Name: Value CRLF
//! ...
//! CRLF
//! [body]
//! ```

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// The CRLF line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Request methods understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Invalid,
    Get,
    Post,
    Head,
    Put,
    Delete,
    Options,
}

impl Method {
    /// Matches a method token exactly (case-sensitive).
    ///
    /// Returns `Method::Invalid` for anything that is not one of the six
    /// known verbs.
    pub fn from_token(token: &[u8]) -> Self {
        match token {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            b"HEAD" => Method::Head,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"OPTIONS" => Method::Options,
            _ => Method::Invalid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Invalid => "UNKNOWN",
        }
    }

    /// Only POST and PUT requests carry a body.
    #[inline]
    pub fn expects_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version from the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    #[default]
    Unknown,
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
            Version::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request under construction.
///
/// The parser is the only writer. A fresh value is swapped in whenever
/// parsing restarts, so nothing from a previous request can leak into the
/// next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) version: Version,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: BytesMut,
    pub(crate) received_at: Option<Instant>,

    /// Declared body length (fixed-length mode only)
    pub(crate) content_length: usize,
    /// Bytes still owed for the chunk being read (chunked mode only)
    pub(crate) chunked_remaining: usize,
    pub(crate) chunked_complete: bool,
}

impl HttpRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn method_str(&self) -> &'static str {
        self.method.as_str()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query string without the leading `?` (empty if absent).
    pub fn query(&self) -> &str {
        &self.query
    }

    /// All headers, keyed by ASCII-lowercased name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks up a header value, ignoring ASCII case in the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Freezes a copy of the body into `Bytes`.
    pub fn body_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }

    /// When the request line was accepted.
    pub fn received_at(&self) -> Option<Instant> {
        self.received_at
    }

    /// The declared `Content-Length` once the header block is complete.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn is_chunked_complete(&self) -> bool {
        self.chunked_complete
    }

    /// Whether the client expects the connection to stay open.
    pub fn keep_alive(&self) -> bool {
        let connection = self.header("Connection");
        match self.version {
            Version::Http11 => {
                !matches!(connection, Some(v) if v.eq_ignore_ascii_case("close"))
            }
            Version::Http10 => {
                matches!(connection, Some(v) if v.eq_ignore_ascii_case("keep-alive"))
            }
            Version::Unknown => false,
        }
    }

    /// Inserts a header, overwriting any earlier value for the same name
    /// in any letter case.
    ///
    /// Leading spaces and tabs of the value are dropped.
    pub(crate) fn add_header(&mut self, name: &str, value: &str) {
        let value = value.trim_start_matches([' ', '\t']);
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub(crate) fn append_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    pub(crate) fn reset_chunked_state(&mut self) {
        self.chunked_remaining = 0;
        self.chunked_complete = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_tokens() {
        assert_eq!(Method::from_token(b"GET"), Method::Get);
        assert_eq!(Method::from_token(b"OPTIONS"), Method::Options);
        assert_eq!(Method::from_token(b"get"), Method::Invalid);
        assert_eq!(Method::from_token(b"PATCH"), Method::Invalid);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_only_post_and_put_expect_body() {
        assert!(Method::Post.expects_body());
        assert!(Method::Put.expects_body());
        assert!(!Method::Get.expects_body());
        assert!(!Method::Delete.expects_body());
    }

    #[test]
    fn test_header_overwrite_and_trim() {
        let mut req = HttpRequest::new();
        req.add_header("Host", "  \texample.com");
        req.add_header("Host", " other.org");
        assert_eq!(req.header("Host"), Some("other.org"));
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_header_case_insensitive_lookup() {
        let mut req = HttpRequest::new();
        req.add_header("content-length", "5");
        assert_eq!(req.header("Content-Length"), Some("5"));
        assert_eq!(req.header("X-Missing"), None);
    }

    #[test]
    fn test_header_case_variants_overwrite() {
        let mut req = HttpRequest::new();
        req.add_header("content-length", "1");
        req.add_header("CONTENT-LENGTH", "2");
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("Content-Length"), Some("2"));
        assert_eq!(req.headers().get("content-length").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_keep_alive() {
        let mut req = HttpRequest::new();
        req.version = Version::Http11;
        assert!(req.keep_alive());
        req.add_header("Connection", "close");
        assert!(!req.keep_alive());

        let mut req = HttpRequest::new();
        req.version = Version::Http10;
        assert!(!req.keep_alive());
        req.add_header("Connection", "Keep-Alive");
        assert!(req.keep_alive());
    }
}
