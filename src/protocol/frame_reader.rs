//! Length-exact reader over an unframed byte stream.
//!
//! Uses `bytes::BytesMut` as the stash of received-but-unconsumed bytes.
//! Whatever the transport delivers (one byte at a time, or several
//! responses coalesced into one segment) is appended to the stash, and
//! callers only ever see exact-length prefixes of it.
//!
//! # Example
//!
//! ```
//! use offload_client::protocol::FrameReader;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> offload_client::Result<()> {
//! let stream: &[u8] = &[0x13, 0, 0, 0, 2];
//! let mut reader = FrameReader::new(stream);
//!
//! assert_eq!(reader.read_u8().await?, 0x13);
//! assert_eq!(reader.read_u32().await?, 2);
//! # Ok(())
//! # }
//! ```

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{OffloadError, Result};

/// Initial stash capacity, and the most the stash grows by per read.
const DEFAULT_CAPACITY: usize = 8 * 1024;

/// Pull-based reader returning exactly `n` bytes per call.
///
/// One `FrameReader` owns one connection's read half and its stash; it is
/// never shared between sessions.
pub struct FrameReader<R> {
    /// Read half of the transport.
    reader: R,
    /// Bytes received but not yet handed out.
    stash: BytesMut,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a new frame reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            stash: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// Returns immediately when the stash already holds `n` bytes; otherwise
    /// suspends until enough bytes arrive. Surplus bytes stay in the stash
    /// for the next call.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the stream ends first. The insufficient bytes
    /// buffered so far are discarded.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        if n == 0 {
            return Ok(Bytes::new());
        }

        while self.stash.len() < n {
            // At most one chunk of headroom per read.
            self.stash.reserve((n - self.stash.len()).min(DEFAULT_CAPACITY));
            let read = match self.reader.read_buf(&mut self.stash).await {
                Ok(read) => read,
                Err(e) => {
                    self.stash.clear();
                    return Err(OffloadError::from_read(e));
                }
            };
            if read == 0 {
                tracing::debug!(
                    "stream closed with {} of {} bytes buffered",
                    self.stash.len(),
                    n
                );
                self.stash.clear();
                return Err(OffloadError::ConnectionClosed);
            }
        }

        Ok(self.stash.split_to(n).freeze())
    }

    /// Read a single byte.
    pub async fn read_u8(&mut self) -> Result<u8> {
        let mut buf = self.read_exact(1).await?;
        Ok(buf.get_u8())
    }

    /// Read a big-endian `u32`.
    pub async fn read_u32(&mut self) -> Result<u32> {
        let mut buf = self.read_exact(4).await?;
        Ok(buf.get_u32())
    }

    /// Number of buffered, unconsumed bytes.
    pub fn buffered(&self) -> usize {
        self.stash.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWriteExt, ReadBuf};

    /// Reader that delivers a fixed sequence of chunks, one per poll, then EOF.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }

        fn bytewise(data: &[u8]) -> Self {
            Self::new(data.iter().map(|b| vec![*b]).collect())
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop_front() {
                let take = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..take]);
                if take < chunk.len() {
                    let rest = chunk.split_off(take);
                    self.chunks.push_front(rest);
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_zero_length_read() {
        let mut reader = FrameReader::new(ChunkedReader::new(vec![]));
        let out = reader.read_exact(0).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_exact_read_from_single_chunk() {
        let mut reader = FrameReader::new(ChunkedReader::new(vec![b"hello".to_vec()]));
        let out = reader.read_exact(5).await.unwrap();
        assert_eq!(&out[..], b"hello");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn test_surplus_is_retained() {
        let mut reader = FrameReader::new(ChunkedReader::new(vec![b"abcdef".to_vec()]));

        let first = reader.read_exact(2).await.unwrap();
        assert_eq!(&first[..], b"ab");
        assert_eq!(reader.buffered(), 4);

        // Served from the stash without touching the transport.
        let second = reader.read_exact(4).await.unwrap();
        assert_eq!(&second[..], b"cdef");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn test_byte_at_a_time() {
        let mut reader = FrameReader::new(ChunkedReader::bytewise(b"fragmented"));
        let out = reader.read_exact(10).await.unwrap();
        assert_eq!(&out[..], b"fragmented");
    }

    #[tokio::test]
    async fn test_split_boundaries_do_not_matter() {
        let stream: Vec<u8> = (0u8..=40).collect();
        let splits: Vec<Vec<Vec<u8>>> = vec![
            vec![stream.clone()],
            stream.iter().map(|b| vec![*b]).collect(),
            vec![stream[..3].to_vec(), stream[3..17].to_vec(), stream[17..].to_vec()],
            stream.chunks(7).map(<[u8]>::to_vec).collect(),
        ];

        for chunks in splits {
            let mut reader = FrameReader::new(ChunkedReader::new(chunks));
            let mut out = Vec::new();
            for len in [1usize, 4, 0, 9, 27] {
                out.extend_from_slice(&reader.read_exact(len).await.unwrap());
            }
            assert_eq!(out, stream);
        }
    }

    #[tokio::test]
    async fn test_consecutive_reads_concatenate() {
        let data = b"0123456789";
        for k in 0..=data.len() {
            let m = data.len() - k;
            let mut reader = FrameReader::new(ChunkedReader::new(vec![
                data[..3].to_vec(),
                data[3..].to_vec(),
            ]));
            let mut out = reader.read_exact(k).await.unwrap().to_vec();
            out.extend_from_slice(&reader.read_exact(m).await.unwrap());
            assert_eq!(&out[..], &data[..]);
        }
    }

    #[tokio::test]
    async fn test_eof_before_enough_bytes() {
        let mut reader = FrameReader::new(ChunkedReader::new(vec![vec![1, 2, 3]]));
        let result = reader.read_exact(4).await;
        assert!(matches!(result, Err(OffloadError::ConnectionClosed)));
        // Partial frame is never handed out later.
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn test_eof_on_empty_stream() {
        let mut reader = FrameReader::new(ChunkedReader::new(vec![]));
        assert!(matches!(
            reader.read_u8().await,
            Err(OffloadError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let mut reader = FrameReader::new(ChunkedReader::new(vec![vec![
            0x12, 0xDE, 0xAD, 0xBE, 0xEF,
        ]]));
        assert_eq!(reader.read_u8().await.unwrap(), 0x12);
        assert_eq!(reader.read_u32().await.unwrap(), 0xDEAD_BEEF);
    }

    #[tokio::test]
    async fn test_large_pending_read_keeps_stash_small() {
        let (client, mut server) = duplex(64);
        let mut reader = FrameReader::new(client);
        server.write_all(&[0x13]).await.unwrap();

        let pending =
            tokio::time::timeout(Duration::from_millis(20), reader.read_exact(1 << 30)).await;
        assert!(pending.is_err());
        assert_eq!(reader.buffered(), 1);
        assert!(
            reader.stash.capacity() <= 4 * DEFAULT_CAPACITY,
            "stash grew to {} bytes",
            reader.stash.capacity()
        );
        drop(server);
    }

    #[tokio::test]
    async fn test_large_read_completes_across_many_chunks() {
        let data: Vec<u8> = (0..100_000u32).map(|i| i as u8).collect();
        let chunks = data.chunks(1000).map(<[u8]>::to_vec).collect();
        let mut reader = FrameReader::new(ChunkedReader::new(chunks));
        let out = reader.read_exact(data.len()).await.unwrap();
        assert_eq!(&out[..], &data[..]);
    }

    #[tokio::test]
    async fn test_waits_for_late_bytes() {
        let (client, mut server) = duplex(64);
        let mut reader = FrameReader::new(client);

        let writer = tokio::spawn(async move {
            server.write_all(&[0xAA, 0xBB]).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            server.write_all(&[0xCC, 0xDD, 0xEE]).await.unwrap();
            server
        });

        let out = reader.read_exact(4).await.unwrap();
        assert_eq!(&out[..], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(reader.read_u8().await.unwrap(), 0xEE);

        let server = writer.await.unwrap();
        drop(server);
        assert!(matches!(
            reader.read_u8().await,
            Err(OffloadError::ConnectionClosed)
        ));
    }
}
