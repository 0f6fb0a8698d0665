//! Matrix payload encoding and whole-frame builders.
//!
//! Uses `bytes::BufMut`/`Buf` for the big-endian entry codec.
//!
//! # Example
//!
//! ```
//! use offload_client::protocol::{decode_matrix, encode_matrix};
//! use offload_client::Matrix;
//!
//! let m = Matrix::new(2, vec![1, -2, 0, i32::MIN]).unwrap();
//! let bytes = encode_matrix(&m);
//! assert_eq!(bytes.len(), 16);
//! assert_eq!(decode_matrix(2, &bytes).unwrap(), m);
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::wire_format::{matrix_payload_len, InitHeader, ENTRY_SIZE, INIT_HEADER_SIZE};
use crate::error::{OffloadError, Result};
use crate::matrix::Matrix;

/// Encode matrix entries as big-endian `i32`s, row-major.
pub fn encode_matrix(matrix: &Matrix) -> Bytes {
    let entries = matrix.as_slice();
    let mut buf = BytesMut::with_capacity(entries.len() * ENTRY_SIZE);
    for &value in entries {
        buf.put_i32(value);
    }
    buf.freeze()
}

/// Decode an `n`×`n` matrix from exactly `n*n*4` big-endian bytes.
///
/// # Errors
///
/// Returns `Protocol` if the payload length does not match the dimension.
pub fn decode_matrix(dimension: u32, mut payload: &[u8]) -> Result<Matrix> {
    let expected = matrix_payload_len(dimension).ok_or_else(|| {
        OffloadError::Protocol(format!("matrix dimension {} overflows", dimension))
    })?;
    if payload.len() != expected {
        return Err(OffloadError::Protocol(format!(
            "matrix of dimension {} needs {} bytes, got {}",
            dimension,
            expected,
            payload.len()
        )));
    }

    let mut data = Vec::with_capacity(expected / ENTRY_SIZE);
    while payload.has_remaining() {
        data.push(payload.get_i32());
    }
    Matrix::new(dimension, data)
}

/// Build a complete INIT frame as one contiguous buffer.
///
/// The session sends header and payload as separate slices of one vectored
/// write; this is the same byte sequence, for callers that want it flat.
pub fn build_init_frame(thread_count: u32, matrix: &Matrix) -> Vec<u8> {
    let header = InitHeader::new(thread_count, matrix.dimension());
    let payload = encode_matrix(matrix);
    let mut buf = Vec::with_capacity(INIT_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    buf
}
