//! # TinyWeb - An Embedded HTTP/1.x Server Core
//!
//! TinyWeb is the core of a small embedded HTTP server: an incremental
//! request parser that tolerates arbitrary packet fragmentation, and a
//! bounded pool of backend connections that request handlers borrow from.
//!
//! ## Features
//!
//! - **Incremental Parsing**: Requests may arrive one byte at a time; the
//!   parser resumes where it left off
//! - **Chunked Bodies**: `Transfer-Encoding: chunked` with trailers
//! - **Pipelining**: Bytes past the end of one request stay in the buffer
//!   for the next
//! - **Bounded Pool**: Connections between `min_size` and `max_size`, grown
//!   on demand and reclaimed when idle
//! - **Async I/O**: Built on Tokio
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TinyWeb                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Handler    │                  │
//! │  │ (Listener)  │    │  Handler    │    │ (yours)     │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │ acquire / drop          │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌──────────────────────────────┐ │
//! │                     │ HttpParser  │    │        ResourcePool          │ │
//! │                     │ (per conn)  │    │  idle FIFO ─ size ≤ max      │ │
//! │                     └─────────────┘    └──────────────┬───────────────┘ │
//! │                                                       ▲                 │
//! │                     ┌─────────────────────────────────┴───────────────┐ │
//! │                     │     Growth + Reclamation (Background Tasks)     │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tinyweb::connection::{handle_connection, ConnectionStats, Handler, Response};
//! use tinyweb::http::HttpRequest;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     async fn handle(&self, request: HttpRequest) -> Response {
//!         Response::ok(format!("hello from {}", request.path()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = Arc::new(Hello);
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(stream, addr, Arc::clone(&handler), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`http`]: Incremental HTTP/1.x request parser and request types
//! - [`pool`]: Bounded, self-maintaining connection pool
//! - [`connection`]: Per-client connection driver and responses
//!
//! ## Design Highlights
//!
//! ### Consuming Cursor
//!
//! The parser reads through the [`http::ByteCursor`] trait and advances it
//! past every byte it accepts. A `BytesMut` read buffer is the usual
//! cursor, so leftover bytes are exactly the start of the next request.
//!
//! ### Scoped Loans
//!
//! [`pool::Pooled`] returns its connection on drop, on every exit path of
//! the borrowing scope. No connection is ever lent to two holders.

pub mod connection;
pub mod http;
pub mod pool;

// Re-export commonly used types for convenience
pub use connection::{handle_connection, ConnectionStats, Handler, Response};
pub use http::{HttpParser, HttpRequest, ParseError, Status};
pub use pool::{ManageConnection, PoolConfig, PoolError, Pooled, ResourcePool, TcpConnector};

/// The default port TinyWeb listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host TinyWeb binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default pool configuration file
pub const DEFAULT_CONFIG_PATH: &str = "conf.json";

/// Version of TinyWeb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
