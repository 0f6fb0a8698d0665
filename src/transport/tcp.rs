//! TCP connection to the worker.
//!
//! # Example
//!
//! ```ignore
//! use offload_client::transport::{connect, DEFAULT_SERVER_ADDR};
//!
//! let connection = connect(DEFAULT_SERVER_ADDR).await?;
//! let (reader, writer) = connection.into_split();
//! ```

use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;

/// Address the reference worker listens on.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

/// Connected TCP stream.
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Connect to `addr`.
    ///
    /// Nagle is disabled: most requests are a single byte and every one of
    /// them waits for an answer.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!("connected to {}", stream.peer_addr()?);
        Ok(Self { stream })
    }

    /// Split into read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }

    /// Remote address.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }
}

/// Open a connection to `addr`.
pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Connection> {
    Connection::connect(addr).await
}
