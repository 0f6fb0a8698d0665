//! # offload-client
//!
//! Rust client for the matrix offload protocol.
//!
//! The client uploads a square `i32` matrix and a thread-count hint to a
//! remote worker, starts the job, polls until the worker reports
//! completion, and downloads the result matrix.
//!
//! ## Architecture
//!
//! - **FrameReader**: exact-length reads reassembled from an unframed byte
//!   stream, surplus bytes kept for the next read
//! - **ProtocolSession**: the INIT → RUN → CHECK* → RESULT state machine,
//!   one exchange per step, strict request/response alternation
//!
//! ## Example
//!
//! ```ignore
//! use offload_client::{Matrix, ProtocolSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let matrix = Matrix::new(2, vec![1, 2, 3, 4])?;
//!     let outcome = ProtocolSession::builder()
//!         .thread_count(4)
//!         .connect("127.0.0.1:8080", matrix)
//!         .await?
//!         .run()
//!         .await?;
//!
//!     println!("{}", outcome.received);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod progress;
pub mod protocol;
pub mod transport;

mod client;
mod matrix;
mod session;
mod writer;

pub use client::{SessionBuilder, TcpSession};
pub use error::{OffloadError, Result};
pub use matrix::Matrix;
pub use progress::{JsonLinesSink, NoopSink, ProgressEvent, ProgressSink, TracingSink};
pub use session::{
    JobOutcome, ProtocolSession, SessionConfig, SessionState, DEFAULT_POLL_INTERVAL,
    DEFAULT_THREAD_COUNT,
};
pub use writer::{FrameWriter, OutboundFrame};
