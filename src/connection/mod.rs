//! Connection Handler Module
//!
//! This module serves individual client connections. Each accepted socket
//! is handled by its own async task, so one slow client never holds up
//! the others.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ HttpParser  │───>│  Handler    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │  Response   │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tinyweb::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = Arc::new(MyHandler);
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod handler;
pub mod response;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, Handler};
pub use response::Response;
