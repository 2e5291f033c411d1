//! Incremental HTTP/1.x Request Parser
//!
//! This module implements a resumable state machine that rebuilds an
//! [`HttpRequest`] from whatever bytes have arrived so far. The caller owns
//! the buffer and simply calls [`HttpParser::parse`] again after each read.
//!
//! ## How the Parser Works
//!
//! Each call returns one of:
//! - `Ok(Status::Complete)` - A full request is available via [`HttpParser::request`]
//! - `Ok(Status::Partial)` - Need more data, nothing is lost
//! - `Err(ParseError)` - Invalid request; the parser has already been reset
//!
//! ## States
//!
//! ```text
//! ExpectRequestLine ──> ExpectHeaders ──┬──────────────────────────────> GotAll
//!                                       ├──> ExpectBody ───────────────> GotAll
//!                                       └──> ExpectChunkedBody <──┐
//!                                               │     │           │
//!                                               │     └─> ExpectChunkedData
//!                                               ▼
//!                                        ExpectChunkedTrailer ────────> GotAll
//! ```
//!
//! Bytes that follow a complete request are left in the buffer; they belong
//! to the next pipelined request.

use crate::http::types::{HttpRequest, Method, Version, CRLF};
use bytes::{Buf, BytesMut};
use std::borrow::Cow;
use std::time::Instant;
use thiserror::Error;

/// Maximum size of a request (1 MiB).
///
/// Bounds the request line (half of it), the header section, a declared
/// `Content-Length` and every declared chunk size.
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Errors that abort the request being parsed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("unsupported method: {0}")]
    InvalidMethod(String),

    #[error("unsupported version: {0}")]
    InvalidVersion(String),

    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    #[error("header section too large: {size} bytes (max: {max})")]
    HeadersTooLarge { size: usize, max: usize },

    #[error("header line without colon")]
    MissingColon,

    #[error("invalid content length: {0}")]
    InvalidContentLength(String),

    #[error("body too large: {size} bytes (max: {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// A POST or PUT with neither `Transfer-Encoding: chunked` nor `Content-Length`
    #[error("request body framing missing")]
    MissingBodyFraming,

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("chunk too large: {size} bytes (max: {max})")]
    ChunkTooLarge { size: usize, max: usize },

    #[error("chunk data not followed by CRLF")]
    MissingChunkTerminator,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Outcome of a successful parse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The request is fully parsed
    Complete,
    /// The buffer ran out before the request was complete
    Partial,
}

/// Where the parser is within the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    #[default]
    ExpectRequestLine,
    ExpectHeaders,
    /// Fixed-length body (`Content-Length`)
    ExpectBody,
    /// Chunk-size line of a chunked body
    ExpectChunkedBody,
    ExpectChunkedData,
    ExpectChunkedTrailer,
    GotAll,
}

/// The readable side of a connection's input buffer.
///
/// The parser only looks at `readable()` and only ever discards a prefix
/// of it.
pub trait ByteCursor {
    /// Bytes available to read, without consuming them.
    fn readable(&self) -> &[u8];

    /// Discards the first `n` readable bytes.
    fn retrieve(&mut self, n: usize);

    /// Offset of the next CRLF within the readable bytes.
    fn find_crlf(&self) -> Option<usize> {
        find_crlf(self.readable())
    }
}

impl ByteCursor for BytesMut {
    fn readable(&self) -> &[u8] {
        &self[..]
    }

    fn retrieve(&mut self, n: usize) {
        self.advance(n);
    }
}

impl<'a> ByteCursor for &'a [u8] {
    fn readable(&self) -> &[u8] {
        self
    }

    fn retrieve(&mut self, n: usize) {
        let rest: &'a [u8] = *self;
        *self = &rest[n..];
    }
}

/// An HTTP/1.x request parser.
///
/// One parser belongs to one connection and is driven from a single task.
///
/// # Example
///
/// ```
/// use tinyweb::http::{HttpParser, Method, Status};
/// use bytes::BytesMut;
///
/// let mut parser = HttpParser::new();
/// let mut buffer = BytesMut::from(&b"GET /login HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
///
/// assert_eq!(parser.parse(&mut buffer).unwrap(), Status::Complete);
/// assert_eq!(parser.request().method(), Method::Get);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct HttpParser {
    state: ParseState,
    request: HttpRequest,
    max_request_size: usize,
    /// Bytes consumed by header and trailer lines of the current request
    header_bytes: usize,
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpParser {
    /// Creates a parser with the default 1 MiB request cap.
    pub fn new() -> Self {
        Self::with_max_request_size(MAX_REQUEST_SIZE)
    }

    pub fn with_max_request_size(max_request_size: usize) -> Self {
        Self {
            state: ParseState::ExpectRequestLine,
            request: HttpRequest::new(),
            max_request_size,
            header_bytes: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Returns `true` once a full request has been parsed.
    #[inline]
    pub fn got_all(&self) -> bool {
        self.state == ParseState::GotAll
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    /// Restores the initial state and swaps in an empty request.
    pub fn reset(&mut self) {
        self.state = ParseState::ExpectRequestLine;
        self.header_bytes = 0;
        self.request = HttpRequest::new();
    }

    /// Takes the accumulated request out and resets the parser.
    pub fn take_request(&mut self) -> HttpRequest {
        let request = std::mem::take(&mut self.request);
        self.reset();
        request
    }

    /// Feeds the parser with whatever is readable in `buf`.
    pub fn parse<B: ByteCursor + ?Sized>(&mut self, buf: &mut B) -> ParseResult<Status> {
        self.parse_at(buf, Instant::now())
    }

    /// Like [`parse`](Self::parse), stamping the request with `received_at`
    /// when its request line is accepted.
    ///
    /// On error the in-progress request is discarded and the parser is back
    /// in `ExpectRequestLine`.
    pub fn parse_at<B: ByteCursor + ?Sized>(
        &mut self,
        buf: &mut B,
        received_at: Instant,
    ) -> ParseResult<Status> {
        let result = self.run(buf, received_at);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn run<B: ByteCursor + ?Sized>(
        &mut self,
        buf: &mut B,
        received_at: Instant,
    ) -> ParseResult<Status> {
        loop {
            // Each step reports whether it made progress
            let progressed = match self.state {
                ParseState::ExpectRequestLine => self.parse_request_line(buf, received_at)?,
                ParseState::ExpectHeaders => self.parse_header_line(buf)?,
                ParseState::ExpectBody => self.parse_fixed_body(buf),
                ParseState::ExpectChunkedBody => self.parse_chunk_size(buf)?,
                ParseState::ExpectChunkedData => self.parse_chunk_data(buf)?,
                ParseState::ExpectChunkedTrailer => self.parse_trailer_line(buf)?,
                ParseState::GotAll => return Ok(Status::Complete),
            };

            if !progressed {
                return Ok(Status::Partial);
            }
        }
    }

    #[inline]
    fn max_line(&self) -> usize {
        self.max_request_size / 2
    }

    /// Parses `METHOD SP PATH[?QUERY] SP HTTP/1.x`
    fn parse_request_line<B: ByteCursor + ?Sized>(
        &mut self,
        buf: &mut B,
        received_at: Instant,
    ) -> ParseResult<bool> {
        let max = self.max_line();
        let pos = match buf.find_crlf() {
            Some(pos) => pos,
            None => {
                let size = buf.readable().len();
                if size > max {
                    return Err(ParseError::LineTooLong { size, max });
                }
                return Ok(false);
            }
        };

        if pos > max {
            return Err(ParseError::LineTooLong { size: pos, max });
        }

        self.process_request_line(&buf.readable()[..pos])?;
        self.request.received_at = Some(received_at);
        buf.retrieve(pos + 2);
        self.header_bytes = 0;
        self.state = ParseState::ExpectHeaders;
        Ok(true)
    }

    fn process_request_line(&mut self, line: &[u8]) -> ParseResult<()> {
        let space = find_byte(line, b' ').ok_or(ParseError::MalformedRequestLine)?;
        let token = &line[..space];
        let method = Method::from_token(token);
        if method == Method::Invalid {
            return Err(ParseError::InvalidMethod(
                String::from_utf8_lossy(token).into_owned(),
            ));
        }

        let rest = &line[space + 1..];
        let space = find_byte(rest, b' ').ok_or(ParseError::MalformedRequestLine)?;
        // Non-UTF-8 target bytes are kept as replacement characters
        let target = String::from_utf8_lossy(&rest[..space]);
        let version = parse_version(&rest[space + 1..])?;

        let (path, query) = target.split_once('?').unwrap_or((target.as_ref(), ""));

        self.request.method = method;
        self.request.path = path.to_string();
        self.request.query = query.to_string();
        self.request.version = version;
        Ok(())
    }

    /// Parses one `Name: Value` line, or the empty line ending the block.
    fn parse_header_line<B: ByteCursor + ?Sized>(&mut self, buf: &mut B) -> ParseResult<bool> {
        let pos = match buf.find_crlf() {
            Some(pos) => pos,
            None => {
                self.check_header_size(buf.readable().len())?;
                return Ok(false);
            }
        };

        self.check_header_size(pos + 2)?;
        self.header_bytes += pos + 2;

        if pos == 0 {
            buf.retrieve(2);
            self.on_headers_complete()?;
            return Ok(true);
        }

        let line = &buf.readable()[..pos];
        let colon = find_byte(line, b':').ok_or(ParseError::MissingColon)?;
        let (name, value) = split_header(line, colon);
        self.request.add_header(&name, &value);

        buf.retrieve(pos + 2);
        Ok(true)
    }

    fn check_header_size(&self, pending: usize) -> ParseResult<()> {
        let size = self.header_bytes + pending;
        if size > self.max_request_size {
            return Err(ParseError::HeadersTooLarge {
                size,
                max: self.max_request_size,
            });
        }
        Ok(())
    }

    /// Decides the body mode once the header block is complete.
    fn on_headers_complete(&mut self) -> ParseResult<()> {
        if !self.request.method.expects_body() {
            self.state = ParseState::GotAll;
            return Ok(());
        }

        if self.request.header("Transfer-Encoding") == Some("chunked") {
            self.request.reset_chunked_state();
            self.state = ParseState::ExpectChunkedBody;
            return Ok(());
        }

        let declared = match self.request.header("Content-Length") {
            Some(value) => parse_content_length(value)?,
            None => return Err(ParseError::MissingBodyFraming),
        };

        if declared > self.max_request_size {
            return Err(ParseError::BodyTooLarge {
                size: declared,
                max: self.max_request_size,
            });
        }

        self.request.content_length = declared;
        self.state = if declared == 0 {
            ParseState::GotAll
        } else {
            ParseState::ExpectBody
        };
        Ok(())
    }

    fn parse_fixed_body<B: ByteCursor + ?Sized>(&mut self, buf: &mut B) -> bool {
        let available = buf.readable();
        if available.is_empty() {
            return false;
        }

        let needed = self.request.content_length - self.request.body.len();
        let n = needed.min(available.len());
        self.request.append_body(&available[..n]);
        buf.retrieve(n);

        if self.request.body.len() == self.request.content_length {
            self.state = ParseState::GotAll;
        }
        true
    }

    /// Parses `<hex-size>[;extension]`
    fn parse_chunk_size<B: ByteCursor + ?Sized>(&mut self, buf: &mut B) -> ParseResult<bool> {
        let pos = match buf.find_crlf() {
            Some(pos) => pos,
            None => {
                let size = buf.readable().len();
                let max = self.max_line();
                if size > max {
                    return Err(ParseError::LineTooLong { size, max });
                }
                return Ok(false);
            }
        };

        let size = parse_chunk_size(&buf.readable()[..pos])?;
        if size > self.max_request_size {
            return Err(ParseError::ChunkTooLarge {
                size,
                max: self.max_request_size,
            });
        }

        let total = self.request.body.len() + size;
        if total > self.max_request_size {
            return Err(ParseError::BodyTooLarge {
                size: total,
                max: self.max_request_size,
            });
        }

        buf.retrieve(pos + 2);

        if size == 0 {
            self.state = ParseState::ExpectChunkedTrailer;
        } else {
            self.request.chunked_remaining = size;
            self.state = ParseState::ExpectChunkedData;
        }
        Ok(true)
    }

    fn parse_chunk_data<B: ByteCursor + ?Sized>(&mut self, buf: &mut B) -> ParseResult<bool> {
        let needed = self.request.chunked_remaining;
        if needed > 0 {
            let available = buf.readable();
            if available.is_empty() {
                return Ok(false);
            }

            let n = needed.min(available.len());
            self.request.append_body(&available[..n]);
            buf.retrieve(n);
            self.request.chunked_remaining -= n;

            if self.request.chunked_remaining > 0 {
                return Ok(true);
            }
        }

        // The chunk is complete; its CRLF must come next
        let available = buf.readable();
        match available.len() {
            0 => Ok(false),
            1 if available[0] == b'\r' => Ok(false),
            1 => Err(ParseError::MissingChunkTerminator),
            _ if &available[..2] == CRLF => {
                buf.retrieve(2);
                self.state = ParseState::ExpectChunkedBody;
                Ok(true)
            }
            _ => Err(ParseError::MissingChunkTerminator),
        }
    }

    /// Parses optional trailer headers up to the final empty line.
    fn parse_trailer_line<B: ByteCursor + ?Sized>(&mut self, buf: &mut B) -> ParseResult<bool> {
        let pos = match buf.find_crlf() {
            Some(pos) => pos,
            None => {
                self.check_header_size(buf.readable().len())?;
                return Ok(false);
            }
        };

        self.check_header_size(pos + 2)?;
        self.header_bytes += pos + 2;

        if pos == 0 {
            buf.retrieve(2);
            self.request.chunked_complete = true;
            self.state = ParseState::GotAll;
            return Ok(true);
        }

        let line = &buf.readable()[..pos];
        // Trailer lines without a colon carry nothing usable and are skipped
        if let Some(colon) = find_byte(line, b':') {
            let (name, value) = split_header(line, colon);
            self.request.add_header(&name, &value);
        }

        buf.retrieve(pos + 2);
        Ok(true)
    }
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[inline]
fn find_byte(buf: &[u8], byte: u8) -> Option<usize> {
    buf.iter().position(|&b| b == byte)
}

/// Splits a header line at `colon`. Obs-text bytes are decoded lossily.
fn split_header(line: &[u8], colon: usize) -> (Cow<'_, str>, Cow<'_, str>) {
    (
        String::from_utf8_lossy(&line[..colon]),
        String::from_utf8_lossy(&line[colon + 1..]),
    )
}

/// The version token must be exactly `HTTP/1.0` or `HTTP/1.1`.
fn parse_version(token: &[u8]) -> ParseResult<Version> {
    match token {
        b"HTTP/1.1" => Ok(Version::Http11),
        b"HTTP/1.0" => Ok(Version::Http10),
        _ => Err(ParseError::InvalidVersion(
            String::from_utf8_lossy(token).into_owned(),
        )),
    }
}

fn parse_content_length(value: &str) -> ParseResult<usize> {
    let digits = value.trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidContentLength(value.to_string()));
    }
    digits
        .parse()
        .map_err(|_| ParseError::InvalidContentLength(value.to_string()))
}

fn parse_chunk_size(line: &[u8]) -> ParseResult<usize> {
    let size = match find_byte(line, b';') {
        Some(semi) => &line[..semi],
        None => line,
    };
    let size = std::str::from_utf8(size)
        .map_err(|_| {
            ParseError::InvalidChunkSize(String::from_utf8_lossy(size).into_owned())
        })?
        .trim();

    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidChunkSize(size.to_string()));
    }

    let n = u64::from_str_radix(size, 16)
        .map_err(|e| ParseError::InvalidChunkSize(e.to_string()))?;
    usize::try_from(n).map_err(|e| ParseError::InvalidChunkSize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNKED_HEAD: &[u8] =
        b"POST /upload HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n";

    fn parse_all(input: &[u8]) -> (HttpParser, ParseResult<Status>, BytesMut) {
        let mut parser = HttpParser::new();
        let mut buf = BytesMut::from(input);
        let result = parser.parse(&mut buf);
        (parser, result, buf)
    }

    /// Feeds `input` one byte at a time, returning the final status.
    fn parse_bytewise(parser: &mut HttpParser, input: &[u8], at: Instant) -> ParseResult<Status> {
        let mut buf = BytesMut::new();
        let mut status = Status::Partial;
        for &b in input {
            buf.extend_from_slice(&[b]);
            status = parser.parse_at(&mut buf, at)?;
        }
        Ok(status)
    }

    #[test]
    fn test_simple_get() {
        let input = b"GET /login HTTP/1.1\r\nHost: x\r\n\r\n";
        let (parser, result, buf) = parse_all(input);

        assert_eq!(result, Ok(Status::Complete));
        assert!(parser.got_all());
        let req = parser.request();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/login");
        assert_eq!(req.query(), "");
        assert_eq!(req.version(), Version::Http11);
        assert_eq!(req.header("Host"), Some("x"));
        assert!(req.body().is_empty());
        assert!(req.received_at().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_path_and_query() {
        let (parser, result, _) = parse_all(b"GET /search?q=rust&page=2 HTTP/1.0\r\n\r\n");
        assert_eq!(result, Ok(Status::Complete));
        assert_eq!(parser.request().path(), "/search");
        assert_eq!(parser.request().query(), "q=rust&page=2");
        assert_eq!(parser.request().version(), Version::Http10);
    }

    #[test]
    fn test_incomplete_request_line() {
        let (parser, result, buf) = parse_all(b"GET /login HTT");
        assert_eq!(result, Ok(Status::Partial));
        assert_eq!(parser.state(), ParseState::ExpectRequestLine);
        assert_eq!(buf.len(), 14);
    }

    #[test]
    fn test_fixed_body_across_feeds() {
        let mut parser = HttpParser::new();
        let mut buf = BytesMut::from(&b"POST /login/doLogin HTTP/1.1\r\nContent-Length: 5\r\n\r\n"[..]);

        assert_eq!(parser.parse(&mut buf), Ok(Status::Partial));
        assert_eq!(parser.state(), ParseState::ExpectBody);

        buf.extend_from_slice(b"abc");
        assert_eq!(parser.parse(&mut buf), Ok(Status::Partial));
        assert_eq!(parser.request().body(), b"abc");

        buf.extend_from_slice(b"de");
        assert_eq!(parser.parse(&mut buf), Ok(Status::Complete));
        assert_eq!(parser.request().body(), b"abcde");
        assert_eq!(parser.request().content_length(), 5);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fixed_body_leaves_pipelined_bytes() {
        let input = b"PUT /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nokGET /b HTTP/1.1\r\n\r\n";
        let (mut parser, result, mut buf) = parse_all(input);
        assert_eq!(result, Ok(Status::Complete));
        assert_eq!(parser.request().body(), b"ok");
        assert_eq!(&buf[..], b"GET /b HTTP/1.1\r\n\r\n");

        // Further calls do not consume anything while complete
        assert_eq!(parser.parse(&mut buf), Ok(Status::Complete));
        assert_eq!(buf.len(), 19);

        let first = parser.take_request();
        assert_eq!(first.path(), "/a");
        assert_eq!(parser.parse(&mut buf), Ok(Status::Complete));
        assert_eq!(parser.request().path(), "/b");
        assert!(parser.request().headers().is_empty());
        assert!(parser.request().body().is_empty());
    }

    #[test]
    fn test_content_length_zero() {
        let (parser, result, _) = parse_all(b"POST /x HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(result, Ok(Status::Complete));
        assert!(parser.request().body().is_empty());
    }

    #[test]
    fn test_get_body_is_not_consumed() {
        let (parser, result, buf) = parse_all(b"GET / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc");
        assert_eq!(result, Ok(Status::Complete));
        assert!(parser.request().body().is_empty());
        assert_eq!(&buf[..], b"abc");
    }

    #[test]
    fn test_chunked_body() {
        let mut input = CHUNKED_HEAD.to_vec();
        input.extend_from_slice(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n");
        let (parser, result, buf) = parse_all(&input);

        assert_eq!(result, Ok(Status::Complete));
        assert_eq!(parser.request().body(), b"Wikipedia");
        assert!(parser.request().is_chunked_complete());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_chunk_extension_and_trailer() {
        let mut input = CHUNKED_HEAD.to_vec();
        input.extend_from_slice(b"A;name=value\r\n0123456789\r\n0\r\nX-Checksum: abc\r\n\r\n");
        let (parser, result, _) = parse_all(&input);

        assert_eq!(result, Ok(Status::Complete));
        assert_eq!(parser.request().body(), b"0123456789");
        assert_eq!(parser.request().header("X-Checksum"), Some("abc"));
        assert_eq!(parser.request().header("Host"), Some("x"));
    }

    #[test]
    fn test_chunk_terminator_waits_for_more_data() {
        let mut parser = HttpParser::new();
        let mut buf = BytesMut::from(CHUNKED_HEAD);
        buf.extend_from_slice(b"3\r\nabc");
        assert_eq!(parser.parse(&mut buf), Ok(Status::Partial));
        assert_eq!(parser.state(), ParseState::ExpectChunkedData);

        buf.extend_from_slice(b"\r");
        assert_eq!(parser.parse(&mut buf), Ok(Status::Partial));

        buf.extend_from_slice(b"\n0\r\n\r\n");
        assert_eq!(parser.parse(&mut buf), Ok(Status::Complete));
        assert_eq!(parser.request().body(), b"abc");
    }

    #[test]
    fn test_chunk_without_terminator_fails() {
        let mut input = CHUNKED_HEAD.to_vec();
        input.extend_from_slice(b"3\r\nabcXY");
        let (parser, result, _) = parse_all(&input);
        assert_eq!(result, Err(ParseError::MissingChunkTerminator));
        assert_eq!(parser.state(), ParseState::ExpectRequestLine);
    }

    #[test]
    fn test_chunk_size_too_large() {
        let mut input = CHUNKED_HEAD.to_vec();
        input.extend_from_slice(b"100001\r\n");
        let (parser, result, _) = parse_all(&input);

        assert!(matches!(result, Err(ParseError::ChunkTooLarge { size: 0x100001, .. })));
        assert_eq!(parser.state(), ParseState::ExpectRequestLine);
        assert_eq!(parser.request(), &HttpRequest::new());
    }

    #[test]
    fn test_invalid_chunk_size() {
        for line in [&b"zz\r\n"[..], &b"\r\n"[..], &b"4g\r\n"[..]] {
            let mut input = CHUNKED_HEAD.to_vec();
            input.extend_from_slice(line);
            let (_, result, _) = parse_all(&input);
            assert!(matches!(result, Err(ParseError::InvalidChunkSize(_))));
        }
    }

    #[test]
    fn test_chunked_total_is_bounded() {
        let mut parser = HttpParser::with_max_request_size(128);
        let mut buf = BytesMut::from(CHUNKED_HEAD);
        buf.extend_from_slice(b"40\r\n");
        buf.extend_from_slice(&[b'a'; 64]);
        buf.extend_from_slice(b"\r\n41\r\n");
        assert!(matches!(
            parser.parse(&mut buf),
            Err(ParseError::BodyTooLarge { size: 129, max: 128 })
        ));
    }

    #[test]
    fn test_invalid_method() {
        let (parser, result, _) = parse_all(b"PATCH / HTTP/1.1\r\n\r\n");
        assert_eq!(result, Err(ParseError::InvalidMethod("PATCH".to_string())));
        assert_eq!(parser.state(), ParseState::ExpectRequestLine);
    }

    #[test]
    fn test_invalid_version() {
        for line in [
            &b"GET / HTTP/1.2\r\n\r\n"[..],
            &b"GET / HTTP/2.0\r\n\r\n"[..],
            &b"GET / HTTP/1.1 \r\n\r\n"[..],
            &b"GET / http/1.1\r\n\r\n"[..],
        ] {
            let (_, result, _) = parse_all(line);
            assert!(matches!(result, Err(ParseError::InvalidVersion(_))));
        }
    }

    #[test]
    fn test_malformed_request_line() {
        let (_, result, _) = parse_all(b"GET\r\n\r\n");
        assert_eq!(result, Err(ParseError::MalformedRequestLine));
        let (_, result, _) = parse_all(b"GET /\r\n\r\n");
        assert_eq!(result, Err(ParseError::MalformedRequestLine));
    }

    #[test]
    fn test_request_line_too_long_without_crlf() {
        let mut parser = HttpParser::with_max_request_size(64);
        let mut buf = BytesMut::from(&b"GET /"[..]);
        buf.extend_from_slice(&[b'a'; 40]);
        assert!(matches!(
            parser.parse(&mut buf),
            Err(ParseError::LineTooLong { size: 45, max: 32 })
        ));
    }

    #[test]
    fn test_header_without_colon() {
        let (parser, result, _) = parse_all(b"GET / HTTP/1.1\r\nBroken header\r\n\r\n");
        assert_eq!(result, Err(ParseError::MissingColon));
        assert!(parser.request().headers().is_empty());
    }

    #[test]
    fn test_post_requires_framing() {
        let (_, result, _) = parse_all(b"POST / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(result, Err(ParseError::MissingBodyFraming));
    }

    #[test]
    fn test_content_length_validation() {
        for value in ["abc", "-1", "+5", "", "99999999999999999999999"] {
            let input = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", value);
            let (_, result, _) = parse_all(input.as_bytes());
            assert!(
                matches!(result, Err(ParseError::InvalidContentLength(_))),
                "value {:?} gave {:?}",
                value,
                result
            );
        }

        let input = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_SIZE + 1
        );
        let (_, result, _) = parse_all(input.as_bytes());
        assert!(matches!(result, Err(ParseError::BodyTooLarge { .. })));
    }

    #[test]
    fn test_repeated_header_last_wins() {
        let (parser, _, _) = parse_all(b"GET / HTTP/1.1\r\nX-A: 1\r\nX-A: 2\r\n\r\n");
        assert_eq!(parser.request().header("X-A"), Some("2"));
    }

    #[test]
    fn test_bytewise_matches_single_feed() {
        let inputs: [Vec<u8>; 3] = [
            b"GET /login?next=/home HTTP/1.1\r\nHost: x\r\nAccept: */*\r\n\r\n".to_vec(),
            b"POST /login/doLogin HTTP/1.0\r\nContent-Length: 27\r\n\r\nusername=admin&password=123".to_vec(),
            [CHUNKED_HEAD, &b"4\r\nWiki\r\n5;x=y\r\npedia\r\n0\r\nX-T: 1\r\n\r\n"[..]].concat(),
        ];

        let at = Instant::now();
        for input in inputs {
            let mut whole = HttpParser::new();
            let mut buf = BytesMut::from(&input[..]);
            assert_eq!(whole.parse_at(&mut buf, at), Ok(Status::Complete));

            let mut split = HttpParser::new();
            assert_eq!(parse_bytewise(&mut split, &input, at), Ok(Status::Complete));

            assert_eq!(whole.request(), split.request());
        }
    }

    #[test]
    fn test_reset_after_error_leaves_nothing_behind() {
        let mut parser = HttpParser::new();
        let mut buf = BytesMut::from(&b"POST /secret HTTP/1.1\r\nCookie: a=b\r\nContent-Length: x\r\n\r\n"[..]);
        assert!(parser.parse(&mut buf).is_err());
        assert_eq!(parser.state(), ParseState::ExpectRequestLine);
        assert_eq!(parser.request(), &HttpRequest::new());

        let mut buf = BytesMut::from(&b"GET /public HTTP/1.1\r\n\r\n"[..]);
        assert_eq!(parser.parse(&mut buf), Ok(Status::Complete));
        assert_eq!(parser.request().path(), "/public");
        assert_eq!(parser.request().header("Cookie"), None);
    }

    #[test]
    fn test_reset_after_complete() {
        let (mut parser, _, _) = parse_all(b"PUT /f HTTP/1.1\r\nContent-Length: 1\r\n\r\nz");
        assert!(parser.got_all());
        parser.reset();
        assert!(!parser.got_all());
        assert_eq!(parser.request(), &HttpRequest::new());
    }

    #[test]
    fn test_slice_cursor() {
        let mut input: &[u8] = b"DELETE /item/7 HTTP/1.1\r\n\r\nrest";
        let mut parser = HttpParser::new();
        assert_eq!(parser.parse(&mut input), Ok(Status::Complete));
        assert_eq!(parser.request().method(), Method::Delete);
        assert_eq!(input, b"rest");
    }

    #[test]
    fn test_header_case_variants_frame_body_deterministically() {
        let input = b"POST / HTTP/1.1\r\ncontent-length: 1\r\nCONTENT-LENGTH: 2\r\n\r\nab";
        for _ in 0..50 {
            let (parser, result, buf) = parse_all(input);
            assert_eq!(result, Ok(Status::Complete));
            assert_eq!(parser.request().body(), b"ab");
            assert_eq!(parser.request().headers().len(), 1);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_non_utf8_bytes_are_accepted() {
        let (parser, result, _) =
            parse_all(b"GET /caf\xe9?q=\xff HTTP/1.1\r\nX-Name: caf\xe9\r\n\r\n");
        assert_eq!(result, Ok(Status::Complete));
        let req = parser.request();
        assert_eq!(req.path(), "/caf\u{FFFD}");
        assert_eq!(req.query(), "q=\u{FFFD}");
        assert_eq!(req.header("X-Name"), Some("caf\u{FFFD}"));
    }

    #[test]
    fn test_non_ascii_chunk_size_is_invalid() {
        let mut input = CHUNKED_HEAD.to_vec();
        input.extend_from_slice(b"\xe9\r\n");
        let (_, result, _) = parse_all(&input);
        assert!(matches!(result, Err(ParseError::InvalidChunkSize(_))));
    }

    #[test]
    fn test_header_line_over_cap() {
        let mut parser = HttpParser::with_max_request_size(64);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-A: "[..]);
        buf.extend_from_slice(&[b'a'; 70]);
        buf.extend_from_slice(b"\r\n\r\n");
        assert_eq!(
            parser.parse(&mut buf),
            Err(ParseError::HeadersTooLarge { size: 77, max: 64 })
        );
        assert_eq!(parser.state(), ParseState::ExpectRequestLine);
    }

    #[test]
    fn test_header_line_over_cap_without_crlf() {
        let mut parser = HttpParser::with_max_request_size(64);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-A: "[..]);
        buf.extend_from_slice(&[b'a'; 70]);
        assert_eq!(
            parser.parse(&mut buf),
            Err(ParseError::HeadersTooLarge { size: 75, max: 64 })
        );
    }

    #[test]
    fn test_header_section_cap_is_cumulative() {
        let mut parser = HttpParser::with_max_request_size(64);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        for n in 1..=4 {
            buf.extend_from_slice(format!("X-{}: aaaaaaaaaa\r\n", n).as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        assert_eq!(
            parser.parse(&mut buf),
            Err(ParseError::HeadersTooLarge { size: 68, max: 64 })
        );
    }

    #[test]
    fn test_trailer_over_cap() {
        let mut parser = HttpParser::with_max_request_size(64);
        let mut buf =
            BytesMut::from(&b"POST /u HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\nX-T: "[..]);
        buf.extend_from_slice(&[b'b'; 40]);
        buf.extend_from_slice(b"\r\n\r\n");
        assert_eq!(
            parser.parse(&mut buf),
            Err(ParseError::HeadersTooLarge { size: 77, max: 64 })
        );
        assert_eq!(parser.request(), &HttpRequest::new());
    }

    #[test]
    fn test_chunk_size_line_too_long_without_crlf() {
        let mut parser = HttpParser::with_max_request_size(64);
        let mut buf =
            BytesMut::from(&b"POST /u HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        assert_eq!(parser.parse(&mut buf), Ok(Status::Partial));
        assert_eq!(parser.state(), ParseState::ExpectChunkedBody);

        buf.extend_from_slice(&[b'0'; 40]);
        assert_eq!(
            parser.parse(&mut buf),
            Err(ParseError::LineTooLong { size: 40, max: 32 })
        );
    }

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"ab\r\ncd"), Some(2));
        assert_eq!(find_crlf(b"ab\rcd\n"), None);
        assert_eq!(find_crlf(b""), None);
    }
}
