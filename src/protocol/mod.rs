//! Protocol module - wire format, matrix codec and the exact-length reader.
//!
//! This module implements the binary protocol spoken with the worker:
//! - Single-byte command and status tags, 9-byte INIT header
//! - Big-endian matrix payload encoding/decoding
//! - Frame reader reassembling exact-length reads from a byte stream

mod frame;
mod frame_reader;
mod wire_format;

pub use frame::{build_init_frame, decode_matrix, encode_matrix};
pub use frame_reader::FrameReader;
pub use wire_format::{
    command, matrix_payload_len, status, Command, InitHeader, Status, DEFAULT_MAX_RESULT_PAYLOAD,
    ENTRY_SIZE, INIT_HEADER_SIZE,
};
