//! HTTP/1.x Request Parsing
//!
//! This module turns raw connection bytes into [`HttpRequest`] values.
//!
//! ## Modules
//!
//! - `types`: `Method`, `Version` and the `HttpRequest` record
//! - `parser`: the incremental `HttpParser` state machine
//!
//! ## Example
//!
//! ```
//! use tinyweb::http::{HttpParser, Status};
//! use bytes::BytesMut;
//!
//! let mut parser = HttpParser::new();
//! let mut buffer = BytesMut::from(&b"POST /login HTTP/1.1\r\nContent-Length: 5\r\n\r\nab"[..]);
//! assert_eq!(parser.parse(&mut buffer).unwrap(), Status::Partial);
//!
//! buffer.extend_from_slice(b"cde");
//! assert_eq!(parser.parse(&mut buffer).unwrap(), Status::Complete);
//! assert_eq!(parser.request().body(), b"abcde");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{
    ByteCursor, HttpParser, ParseError, ParseResult, ParseState, Status, MAX_REQUEST_SIZE,
};
pub use types::{HttpRequest, Method, Version};
