//! Progress notifications emitted while a job runs.
//!
//! A [`ProgressSink`] receives one [`ProgressEvent`] per notable step of the
//! handshake, including the final before/after matrices. The crate ships
//! three sinks:
//!
//! - [`NoopSink`]: discards everything
//! - [`TracingSink`]: logs through `tracing`
//! - [`JsonLinesSink`]: one JSON object per line on stdout
//!
//! Any `Fn(&ProgressEvent<'_>)` closure is a sink as well.
//!
//! # Important
//!
//! - **stdout** carries JSON lines only when `JsonLinesSink` is used
//! - Logs go through `tracing`, never to stdout
//! - Lines end with an explicit `\n`, not `println!`

use std::io::Write;

use serde::Serialize;

use crate::matrix::Matrix;
use crate::session::SessionState;

/// A progress notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent<'a> {
    /// Server accepted INIT.
    Initialized { dimension: u32, thread_count: u32 },
    /// Server accepted RUN.
    RunAccepted,
    /// CHECK answered BUSY. `attempt` counts CHECKs sent so far.
    Busy { attempt: u32 },
    /// CHECK answered DONE after `polls` CHECKs.
    Completed { polls: u32 },
    /// Result downloaded.
    Finished {
        sent: &'a Matrix,
        received: &'a Matrix,
    },
    /// The session failed in `state`.
    Failed { state: SessionState, error: String },
}

/// Receiver of progress notifications.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent<'_>) + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent<'_>) {
        self(event)
    }
}

/// Sink that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn notify(&self, _event: &ProgressEvent<'_>) {}
}

/// Sink that logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn notify(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Initialized {
                dimension,
                thread_count,
            } => tracing::info!(
                "INIT OK ({}x{} matrix, {} threads)",
                dimension,
                dimension,
                thread_count
            ),
            ProgressEvent::RunAccepted => tracing::info!("RUN accepted"),
            ProgressEvent::Busy { attempt } => {
                tracing::info!("server still working (check #{})", attempt)
            }
            ProgressEvent::Completed { polls } => {
                tracing::info!("computation finished after {} checks", polls)
            }
            ProgressEvent::Finished { sent, received } => tracing::info!(
                "sent matrix ({0}x{0}):\n{1}received matrix ({2}x{2}):\n{3}",
                sent.dimension(),
                sent,
                received.dimension(),
                received
            ),
            ProgressEvent::Failed { state, error } => {
                tracing::warn!("session failed in {}: {}", state, error)
            }
        }
    }
}

/// Sink writing each event as a single JSON line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesSink;

impl ProgressSink for JsonLinesSink {
    fn notify(&self, event: &ProgressEvent<'_>) {
        if let Err(e) = write_stdout_json(event) {
            tracing::error!("failed to write progress event: {}", e);
        }
    }
}

/// Write a line to stdout.
///
/// Writes the string followed by a single `\n` and flushes.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

/// Write a JSON value to stdout as a single line.
///
/// # Errors
///
/// Returns error if serialization or write fails.
pub fn write_stdout_json<T: Serialize>(value: &T) -> crate::error::Result<()> {
    let json = serde_json::to_string(value)?;
    write_stdout_line(&json)?;
    Ok(())
}
