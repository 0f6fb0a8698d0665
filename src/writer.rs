//! Frame writer for the request side of the connection.
//!
//! A request is handed to the transport as one vectored write of its
//! header and payload slices. Partial writes are continued until the whole
//! frame is out, so from the caller's point of view a send either delivers
//! every byte of the frame or fails with `TransportWrite`.
//!
//! The protocol is strictly half-duplex, so the writer is owned directly by
//! the session rather than fed through a channel.

use std::io::{self, IoSlice};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{OffloadError, Result};
use crate::matrix::Matrix;
use crate::protocol::{encode_matrix, Command, InitHeader};

/// A request frame ready to be written.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Command byte, plus the fixed INIT fields when present.
    pub header: Bytes,
    /// Payload bytes (empty for everything except INIT).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// A bare command frame (RUN, CHECK, RESULT).
    pub fn command(command: Command) -> Self {
        Self {
            header: Bytes::copy_from_slice(&[command.tag()]),
            payload: Bytes::new(),
        }
    }

    /// An INIT frame carrying the thread-count hint and the matrix.
    pub fn init(thread_count: u32, matrix: &Matrix) -> Self {
        let header = InitHeader::new(thread_count, matrix.dimension());
        Self {
            header: Bytes::copy_from_slice(&header.encode()),
            payload: encode_matrix(matrix),
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.header.len() + self.payload.len()
    }
}

/// Write half of the connection.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a whole frame and flush.
    ///
    /// # Errors
    ///
    /// `TransportWrite` if any part of the frame could not be written.
    pub async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        write_frame(&mut self.writer, frame)
            .await
            .map_err(OffloadError::TransportWrite)
    }

    /// Shut down the write direction of the transport.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }

    /// Consume the writer, returning the write half.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write a frame using scatter/gather I/O (write_vectored).
///
/// The fast path hands header and payload to the kernel in a single call;
/// after a short write the remaining slices are rebuilt and retried.
async fn write_frame<W>(writer: &mut W, frame: &OutboundFrame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size = frame.size();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = remaining_slices(frame, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }
        total_written += written;
    }

    writer.flush().await
}

/// Build the IoSlice array for the part of `frame` after `skip_bytes`.
fn remaining_slices(frame: &OutboundFrame, skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(2);
    let header_len = frame.header.len();

    if skip_bytes < header_len {
        slices.push(IoSlice::new(&frame.header[skip_bytes..]));
    }

    if !frame.payload.is_empty() {
        let start_in_payload = skip_bytes.saturating_sub(header_len);
        if start_in_payload < frame.payload.len() {
            slices.push(IoSlice::new(&frame.payload[start_in_payload..]));
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, AsyncReadExt};

    /// Writer accepting at most `limit` bytes per call.
    struct TrickleWriter {
        written: Vec<u8>,
        limit: usize,
    }

    impl AsyncWrite for TrickleWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let n = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Writer that always fails.
    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn sample_matrix() -> Matrix {
        Matrix::new(2, vec![1, 2, 3, 4]).unwrap()
    }

    #[test]
    fn test_command_frame() {
        let frame = OutboundFrame::command(Command::Check);
        assert_eq!(&frame.header[..], &[0x03]);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.size(), 1);
    }

    #[test]
    fn test_init_frame_sizes() {
        let frame = OutboundFrame::init(4, &sample_matrix());
        assert_eq!(frame.header.len(), 9);
        assert_eq!(frame.payload.len(), 16);
        assert_eq!(frame.size(), 25);
    }

    #[test]
    fn test_remaining_slices_no_skip() {
        let frame = OutboundFrame::init(4, &sample_matrix());
        let slices = remaining_slices(&frame, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_remaining_slices_partial_header() {
        let frame = OutboundFrame::init(4, &sample_matrix());
        let slices = remaining_slices(&frame, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), 4);
        assert_eq!(slices[1].len(), 16);
    }

    #[test]
    fn test_remaining_slices_inside_payload() {
        let frame = OutboundFrame::init(4, &sample_matrix());
        let slices = remaining_slices(&frame, 9 + 6);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 10);
    }

    #[tokio::test]
    async fn test_send_writes_whole_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        let frame = OutboundFrame::init(4, &sample_matrix());
        writer.send(&frame).await.unwrap();

        let written = writer.into_inner().into_inner();
        assert_eq!(
            written,
            crate::protocol::build_init_frame(4, &sample_matrix())
        );
    }

    #[tokio::test]
    async fn test_send_survives_short_writes() {
        let mut writer = FrameWriter::new(TrickleWriter {
            written: Vec::new(),
            limit: 3,
        });
        let frame = OutboundFrame::init(7, &sample_matrix());
        writer.send(&frame).await.unwrap();

        let inner = writer.into_inner();
        assert_eq!(
            inner.written,
            crate::protocol::build_init_frame(7, &sample_matrix())
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_transport_write() {
        let mut writer = FrameWriter::new(BrokenWriter);
        let result = writer.send(&OutboundFrame::command(Command::Run)).await;
        assert!(matches!(result, Err(OffloadError::TransportWrite(_))));
    }

    #[tokio::test]
    async fn test_send_over_duplex() {
        let (client, mut server) = duplex(64);
        let mut writer = FrameWriter::new(client);
        writer
            .send(&OutboundFrame::command(Command::Result))
            .await
            .unwrap();

        let mut buf = [0u8; 1];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x04]);
    }
}
