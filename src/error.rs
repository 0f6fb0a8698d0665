//! Error types for offload-client.

use std::io;

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for all offload operations.
///
/// Every error is terminal for the session that produced it: the session
/// moves to [`SessionState::Failed`] and closes its connection.
#[derive(Debug, Error)]
pub enum OffloadError {
    /// Writing a frame to the transport failed.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] io::Error),

    /// The stream ended before a required read completed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server answered INIT with something other than OK.
    #[error("INIT rejected by server (status 0x{0:02x})")]
    InitRejected(u8),

    /// Server answered RUN with something other than OK.
    #[error("RUN rejected by server (status 0x{0:02x})")]
    RunRejected(u8),

    /// Server answered RESULT with something other than DONE.
    #[error("RESULT rejected by server (status 0x{0:02x})")]
    ResultRejected(u8),

    /// CHECK returned a byte that is neither BUSY nor DONE.
    #[error("unexpected CHECK status 0x{0:02x}")]
    UnexpectedStatus(u8),

    /// I/O error while reading or connecting.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error (progress sink only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (malformed matrix, oversized result, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The session already reached a terminal state.
    #[error("session already terminated ({0})")]
    Terminated(SessionState),
}

impl OffloadError {
    /// Classify a read-side I/O error.
    ///
    /// Errors that mean the peer went away collapse into `ConnectionClosed`.
    pub(crate) fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => OffloadError::ConnectionClosed,
            _ => OffloadError::Io(err),
        }
    }
}

/// Result type alias using OffloadError.
pub type Result<T> = std::result::Result<T, OffloadError>;
