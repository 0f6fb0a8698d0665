//! Protocol session: the INIT → RUN → CHECK* → RESULT state machine.
//!
//! A [`ProtocolSession`] owns one connection and drives one job over it.
//! Each call to [`ProtocolSession::step`] performs exactly one
//! request/response exchange and advances the state:
//!
//! ```text
//! Idle ─INIT/OK─► Running ─RUN/OK─► Polling ─CHECK/DONE─► Collecting ─RESULT/DONE─► Done
//!   │                │              │    ▲                    │
//!   │                │              └────┘ CHECK/BUSY         │
//!   └────────────────┴──────────────┴─────────────────────────┴──► Failed
//! ```
//!
//! The command sent is chosen from the current state alone, so RUN can
//! never precede an accepted INIT and RESULT can never precede DONE.
//! Any error moves the session to `Failed` and closes the connection.
//!
//! # Example
//!
//! ```ignore
//! use offload_client::{Matrix, ProtocolSession};
//!
//! let matrix = Matrix::new(2, vec![1, 2, 3, 4])?;
//! let session = ProtocolSession::builder()
//!     .thread_count(4)
//!     .connect("127.0.0.1:8080", matrix)
//!     .await?;
//! let outcome = session.run().await?;
//! println!("{}", outcome.received);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::SessionBuilder;
use crate::error::{OffloadError, Result};
use crate::matrix::Matrix;
use crate::progress::{NoopSink, ProgressEvent, ProgressSink};
use crate::protocol::{
    decode_matrix, matrix_payload_len, status, Command, FrameReader, Status,
    DEFAULT_MAX_RESULT_PAYLOAD,
};
use crate::writer::{FrameWriter, OutboundFrame};

/// Default worker thread-count hint.
pub const DEFAULT_THREAD_COUNT: u32 = 4;

/// Default delay before each CHECK.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where the handshake is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing sent yet.
    Idle,
    /// INIT sent, waiting for its status.
    Initializing,
    /// INIT accepted, RUN not yet sent.
    Running,
    /// RUN accepted; CHECKs until DONE.
    Polling,
    /// DONE seen; fetching the result.
    Collecting,
    /// Result downloaded.
    Done,
    /// An error ended the session.
    Failed,
}

impl SessionState {
    /// `Done` and `Failed` accept no further steps.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::Running => "running",
            SessionState::Polling => "polling",
            SessionState::Collecting => "collecting",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Thread-count hint sent with INIT.
    pub thread_count: u32,
    /// Delay before each CHECK.
    pub poll_interval: Duration,
    /// Largest RESULT matrix payload accepted, in bytes.
    pub max_result_payload: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_result_payload: DEFAULT_MAX_RESULT_PAYLOAD,
        }
    }
}

/// Matrices and poll count of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Matrix uploaded with INIT.
    pub sent: Matrix,
    /// Matrix downloaded with RESULT.
    pub received: Matrix,
    /// Number of CHECKs sent.
    pub polls: u32,
}

/// Both halves of the connection. Dropped as a unit on close.
struct Connection<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

/// One job's handshake over one connection.
pub struct ProtocolSession<R, W> {
    /// `None` once the connection has been closed.
    conn: Option<Connection<R, W>>,
    state: SessionState,
    /// Command whose response has not been fully consumed yet.
    in_flight: Option<Command>,
    config: SessionConfig,
    matrix: Matrix,
    result: Option<Matrix>,
    polls: u32,
    sink: Arc<dyn ProgressSink>,
}

impl ProtocolSession<(), ()> {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}

impl<R, W> ProtocolSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a session with the given configuration and no progress sink.
    pub fn new(reader: R, writer: W, matrix: Matrix, config: SessionConfig) -> Self {
        Self::with_sink(reader, writer, matrix, config, Arc::new(NoopSink))
    }

    /// Create a session reporting to `sink`.
    pub fn with_sink(
        reader: R,
        writer: W,
        matrix: Matrix,
        config: SessionConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            conn: Some(Connection {
                reader: FrameReader::new(reader),
                writer: FrameWriter::new(writer),
            }),
            state: SessionState::Idle,
            in_flight: None,
            config,
            matrix,
            result: None,
            polls: 0,
            sink,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The matrix sent with INIT.
    #[inline]
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// The downloaded matrix, once `Done`.
    #[inline]
    pub fn result(&self) -> Option<&Matrix> {
        self.result.as_ref()
    }

    /// Number of CHECKs sent so far.
    #[inline]
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Whether the connection has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Perform one exchange and return the new state.
    ///
    /// # Errors
    ///
    /// `Terminated` if the session is already `Done` or `Failed`; nothing is
    /// sent in that case. Any other error has moved the session to `Failed`
    /// and closed the connection.
    pub async fn step(&mut self) -> Result<SessionState> {
        if self.state.is_terminal() {
            return Err(OffloadError::Terminated(self.state));
        }

        // A dropped step future can leave a response half-read; the stream
        // position is unknown from here on.
        let interrupted = self.in_flight.or(match self.state {
            SessionState::Initializing => Some(Command::Init),
            _ => None,
        });
        if let Some(command) = interrupted {
            let err = OffloadError::Protocol(format!(
                "{} exchange was interrupted before its response was read",
                command
            ));
            return Err(self.fail(err).await);
        }

        let outcome = match self.state {
            SessionState::Idle => self.initialize().await,
            SessionState::Running => self.start_run().await,
            SessionState::Polling => self.poll_once().await,
            SessionState::Collecting => self.collect().await,
            SessionState::Initializing | SessionState::Done | SessionState::Failed => {
                Err(OffloadError::Terminated(self.state))
            }
        };

        match outcome {
            Ok(state) => Ok(state),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Drive the handshake to completion.
    ///
    /// Sleeps `poll_interval` before every CHECK and keeps polling until the
    /// server reports DONE; there is no attempt limit.
    pub async fn run(mut self) -> Result<JobOutcome> {
        while self.state != SessionState::Done {
            self.step().await?;
        }

        let received = self.result.take().ok_or_else(|| {
            OffloadError::Protocol("session finished without a result".to_string())
        })?;
        Ok(JobOutcome {
            sent: self.matrix,
            received,
            polls: self.polls,
        })
    }

    /// Close the connection.
    ///
    /// Shuts down the write direction, then drops both halves. Calling it
    /// again is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            tracing::debug!("closing connection in state {}", self.state);
            if let Err(e) = conn.writer.shutdown().await {
                tracing::error!("failed to shut down connection: {}", e);
            }
        }
    }

    /// Idle → Initializing → Running.
    async fn initialize(&mut self) -> Result<SessionState> {
        self.state = SessionState::Initializing;

        let frame = OutboundFrame::init(self.config.thread_count, &self.matrix);
        let status = self.exchange(Command::Init, &frame).await?;
        if status != status::OK {
            return Err(OffloadError::InitRejected(status));
        }
        self.in_flight = None;

        self.state = SessionState::Running;
        tracing::debug!(
            "INIT accepted ({}x{} matrix, {} threads)",
            self.matrix.dimension(),
            self.matrix.dimension(),
            self.config.thread_count
        );
        self.sink.notify(&ProgressEvent::Initialized {
            dimension: self.matrix.dimension(),
            thread_count: self.config.thread_count,
        });
        Ok(self.state)
    }

    /// Running → Polling.
    async fn start_run(&mut self) -> Result<SessionState> {
        let status = self
            .exchange(Command::Run, &OutboundFrame::command(Command::Run))
            .await?;
        if status != status::OK {
            return Err(OffloadError::RunRejected(status));
        }
        self.in_flight = None;

        self.state = SessionState::Polling;
        tracing::debug!("RUN accepted");
        self.sink.notify(&ProgressEvent::RunAccepted);
        Ok(self.state)
    }

    /// Polling → Polling | Collecting.
    async fn poll_once(&mut self) -> Result<SessionState> {
        tokio::time::sleep(self.config.poll_interval).await;

        let status = self
            .exchange(Command::Check, &OutboundFrame::command(Command::Check))
            .await?;
        self.polls = self.polls.saturating_add(1);

        match Status::from_byte(status) {
            Some(Status::Busy) => {
                self.in_flight = None;
                tracing::debug!("server busy (check #{})", self.polls);
                self.sink
                    .notify(&ProgressEvent::Busy { attempt: self.polls });
            }
            Some(Status::Done) => {
                self.in_flight = None;
                self.state = SessionState::Collecting;
                tracing::debug!("computation finished after {} checks", self.polls);
                self.sink
                    .notify(&ProgressEvent::Completed { polls: self.polls });
            }
            _ => return Err(OffloadError::UnexpectedStatus(status)),
        }
        Ok(self.state)
    }

    /// Collecting → Done.
    async fn collect(&mut self) -> Result<SessionState> {
        let status = self
            .exchange(Command::Result, &OutboundFrame::command(Command::Result))
            .await?;
        if status != status::DONE {
            return Err(OffloadError::ResultRejected(status));
        }

        let max_payload = self.config.max_result_payload;
        let conn = self.conn.as_mut().ok_or(OffloadError::ConnectionClosed)?;
        let dimension = conn.reader.read_u32().await?;
        let payload_len = matrix_payload_len(dimension)
            .filter(|len| *len <= max_payload as usize)
            .ok_or_else(|| {
                OffloadError::Protocol(format!(
                    "result matrix of dimension {} exceeds maximum payload {}",
                    dimension, max_payload
                ))
            })?;
        let payload = conn.reader.read_exact(payload_len).await?;
        let received = decode_matrix(dimension, &payload)?;
        self.in_flight = None;

        self.state = SessionState::Done;
        tracing::debug!("received {}x{} result", dimension, dimension);
        self.sink.notify(&ProgressEvent::Finished {
            sent: &self.matrix,
            received: &received,
        });
        self.result = Some(received);
        self.close().await;
        Ok(self.state)
    }

    /// Send one request and read its status byte.
    async fn exchange(&mut self, command: Command, frame: &OutboundFrame) -> Result<u8> {
        let conn = self.conn.as_mut().ok_or(OffloadError::ConnectionClosed)?;

        self.in_flight = Some(command);
        tracing::debug!("-> {} ({} bytes)", command, frame.size());
        conn.writer.send(frame).await?;

        let status = conn.reader.read_u8().await?;
        tracing::debug!("<- 0x{:02x} for {}", status, command);
        Ok(status)
    }

    /// Move to `Failed`, close the connection and hand the error back.
    async fn fail(&mut self, err: OffloadError) -> OffloadError {
        let state = self.state;
        tracing::warn!("session failed in {}: {}", state, err);

        self.state = SessionState::Failed;
        self.sink.notify(&ProgressEvent::Failed {
            state,
            error: err.to_string(),
        });
        self.close().await;
        err
    }
}
