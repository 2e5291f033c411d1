//! Connection Managers
//!
//! A [`ManageConnection`] knows how to open one connection to the backing
//! store. The pool decides when to call it; the manager never sees the
//! pool's bookkeeping.

use crate::pool::config::PoolConfig;
use std::future::Future;
use tokio::net::TcpStream;
use tracing::debug;

/// Creates the connections held by a [`ResourcePool`](crate::pool::ResourcePool).
pub trait ManageConnection: Send + Sync + 'static {
    /// The pooled resource
    type Connection: Send + 'static;

    /// Error returned when a connection cannot be created
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// Opens plain TCP connections to the configured store address.
///
/// The protocol spoken over the stream is up to the code that acquires it.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    /// Creates a connector for `address` (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.address())
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl ManageConnection for TcpConnector {
    type Connection = TcpStream;
    type Error = std::io::Error;

    async fn connect(&self) -> Result<TcpStream, std::io::Error> {
        let stream = TcpStream::connect(&self.address).await?;
        stream.set_nodelay(true)?;
        debug!(address = %self.address, "Opened store connection");
        Ok(stream)
    }
}
