//! Connection Handler Module
//!
//! Each client gets its own handler task that runs in a loop, feeding
//! socket bytes to an [`HttpParser`] and answering every complete request.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  Read bytes from socket      │
//!    │              │               │
//!    │              ▼               │
//!    │  Feed HttpParser             │
//!    │              │ Complete      │
//!    │              ▼               │
//!    │  Handler::handle(request)    │
//!    │              │               │
//!    │              ▼               │
//!    │  Send response               │
//!    │              │ keep-alive    │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Connection: close / parse error / client disconnects
//! ```
//!
//! ## Buffer Management
//!
//! The parser consumes bytes from the front of the BytesMut buffer as it
//! goes, so the buffer only ever holds the unparsed tail: a partial line,
//! or the start of the next pipelined request.

use crate::connection::response::Response;
use crate::http::{HttpParser, HttpRequest, ParseError, ParseState, Status, MAX_REQUEST_SIZE};
use bytes::BytesMut;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// Unparsed bytes are bounded by the longest line the parser accepts
const MAX_BUFFER_SIZE: usize = MAX_REQUEST_SIZE;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Produces a response for each parsed request.
///
/// Implementations are shared by every connection task.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: HttpRequest) -> impl Future<Output = Response> + Send;
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests answered
    pub requests_processed: AtomicU64,
    /// Requests rejected as malformed
    pub parse_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Owns the read buffer and the parser for one client. Generic over the
/// stream so tests can drive it with an in-memory transport.
pub struct ConnectionHandler<S, H> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes read but not yet consumed by the parser
    buffer: BytesMut,

    parser: HttpParser,

    /// Shared across connections
    handler: Arc<H>,

    stats: Arc<ConnectionStats>,
}

impl<S, H> ConnectionHandler<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client's byte stream, usually a `TcpStream`
    /// * `addr` - The client's socket address (for logging)
    /// * `handler` - Produces a response for every parsed request
    /// * `stats` - Shared connection statistics
    pub fn new(stream: S, addr: SocketAddr, handler: Arc<H>, stats: Arc<ConnectionStats>) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: HttpParser::new(),
            handler,
            stats,
        }
    }

    /// Runs the connection until the client closes it, asks for
    /// `Connection: close`, or sends something unparseable.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The read-parse-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Pipelined requests may already be sitting in the buffer
            while let Some(request) = self.try_parse_request().await? {
                let keep_alive = request.keep_alive();
                debug!(
                    client = %self.addr,
                    method = request.method_str(),
                    path = request.path(),
                    "Request"
                );

                let response = self.handler.handle(request).await;
                self.stats.request_processed();
                self.send_response(&response, keep_alive).await?;

                if !keep_alive {
                    return Ok(());
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Feeds the buffer to the parser.
    ///
    /// A malformed request is answered with `400 Bad Request` before the
    /// error is returned, and the connection goes down with it.
    async fn try_parse_request(&mut self) -> Result<Option<HttpRequest>, ConnectionError> {
        if self.buffer.is_empty() && self.parser.state() == ParseState::ExpectRequestLine {
            return Ok(None);
        }

        match self.parser.parse(&mut self.buffer) {
            Ok(Status::Complete) => {
                trace!(
                    client = %self.addr,
                    remaining = self.buffer.len(),
                    "Parsed request"
                );
                Ok(Some(self.parser.take_request()))
            }
            Ok(Status::Partial) => {
                trace!(
                    client = %self.addr,
                    state = ?self.parser.state(),
                    buffered = self.buffer.len(),
                    "Incomplete request, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Parse error");
                self.stats.parse_error();
                self.send_response(&Response::bad_request(), false).await?;
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() && self.parser.state() == ParseState::ExpectRequestLine {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial request in flight
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    async fn send_response(
        &mut self,
        response: &Response,
        keep_alive: bool,
    ) -> Result<(), ConnectionError> {
        let bytes = response.serialize(keep_alive);
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            status = response.status,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client sent a malformed request
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client disconnected between requests
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client disconnected in the middle of a request
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Creates a [`ConnectionHandler`] and runs it to completion.
///
/// Disconnects and resets are expected and not reported; other errors are
/// logged at debug level.
///
/// # Arguments
///
/// * `stream` - The accepted client stream
/// * `addr` - The client's socket address
/// * `handler` - The request handler shared by all connections
/// * `stats` - Shared connection statistics
pub async fn handle_connection<S, H>(
    stream: S,
    addr: SocketAddr,
    handler: Arc<H>,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    let connection = ConnectionHandler::new(stream, addr, handler, stats);
    if let Err(e) = connection.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
