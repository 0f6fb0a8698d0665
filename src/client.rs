//! Session builder.
//!
//! The [`SessionBuilder`] provides a fluent API for configuring a
//! [`ProtocolSession`] and attaching it to a transport:
//! 1. Set thread count, poll interval and limits
//! 2. Attach a progress sink
//! 3. Either hand over an existing read/write pair (`build`) or open a TCP
//!    connection (`connect`)
//!
//! # Example
//!
//! ```ignore
//! use offload_client::{Matrix, ProtocolSession, TracingSink};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let matrix = Matrix::new(2, vec![1, 2, 3, 4])?;
//!     let outcome = ProtocolSession::builder()
//!         .thread_count(4)
//!         .poll_interval(Duration::from_millis(500))
//!         .progress_sink(TracingSink)
//!         .connect("127.0.0.1:8080", matrix)
//!         .await?
//!         .run()
//!         .await?;
//!
//!     println!("{}", outcome.received);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::ToSocketAddrs;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::progress::{NoopSink, ProgressSink};
use crate::session::{ProtocolSession, SessionConfig};
use crate::transport;

/// Session over a TCP connection.
pub type TcpSession = ProtocolSession<OwnedReadHalf, OwnedWriteHalf>;

/// Builder for configuring and creating a [`ProtocolSession`].
pub struct SessionBuilder {
    config: SessionConfig,
    sink: Arc<dyn ProgressSink>,
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            sink: Arc::new(NoopSink),
        }
    }

    /// Set the thread-count hint sent with INIT.
    ///
    /// Default: 4
    pub fn thread_count(mut self, threads: u32) -> Self {
        self.config.thread_count = threads;
        self
    }

    /// Set the delay before each CHECK.
    ///
    /// Default: 1 second
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the largest accepted RESULT matrix payload in bytes.
    ///
    /// Default: 1 GB
    pub fn max_result_payload(mut self, bytes: u32) -> Self {
        self.config.max_result_payload = bytes;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Report progress to `sink`.
    pub fn progress_sink<S>(mut self, sink: S) -> Self
    where
        S: ProgressSink + 'static,
    {
        self.sink = Arc::new(sink);
        self
    }

    /// Report progress to an already shared sink.
    pub fn shared_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build a session over an existing transport.
    pub fn build<R, W>(self, reader: R, writer: W, matrix: Matrix) -> ProtocolSession<R, W>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        ProtocolSession::with_sink(reader, writer, matrix, self.config, self.sink)
    }

    /// Open a TCP connection to `addr` and build a session over it.
    pub async fn connect<A>(self, addr: A, matrix: Matrix) -> Result<TcpSession>
    where
        A: ToSocketAddrs,
    {
        let connection = transport::connect(addr).await?;
        let (reader, writer) = connection.into_split();
        Ok(self.build(reader, writer, matrix))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::TracingSink;
    use crate::session::SessionState;

    #[test]
    fn test_builder_default() {
        let builder = SessionBuilder::default();
        assert_eq!(builder.config.thread_count, 4);
        assert_eq!(builder.config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_builder_configuration() {
        let builder = ProtocolSession::builder()
            .thread_count(16)
            .poll_interval(Duration::from_millis(250))
            .max_result_payload(1024)
            .progress_sink(TracingSink);

        assert_eq!(builder.config.thread_count, 16);
        assert_eq!(builder.config.poll_interval, Duration::from_millis(250));
        assert_eq!(builder.config.max_result_payload, 1024);
    }

    #[test]
    fn test_build_starts_idle() {
        let matrix = Matrix::new(1, vec![9]).unwrap();
        let session = SessionBuilder::new()
            .thread_count(2)
            .build(tokio::io::empty(), tokio::io::sink(), matrix.clone());

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.matrix(), &matrix);
        assert_eq!(session.config().thread_count, 2);
        assert!(session.result().is_none());
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let matrix = Matrix::new(1, vec![1]).unwrap();
        let result = SessionBuilder::new().connect(addr, matrix).await;
        assert!(matches!(result, Err(crate::OffloadError::Io(_))));
    }
}
