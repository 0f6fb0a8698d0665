//! Wire format encoding and decoding.
//!
//! Every request starts with a single command byte. Only INIT carries a
//! body, with a fixed 9-byte header in front of the matrix payload:
//! ```text
//! ┌─────────┬──────────────┬──────────────┬────────────────────┐
//! │ Command │ Thread count │ Dimension N  │ Matrix (N*N i32)   │
//! │ 1 byte  │ uint32 BE    │ uint32 BE    │ 4*N*N bytes, BE    │
//! └─────────┴──────────────┴──────────────┴────────────────────┘
//! ```
//!
//! Every response starts with a single status byte. A successful RESULT
//! response is followed by `uint32 BE n` and `n*n` big-endian `i32`s.
//!
//! All multi-byte integers are Big Endian.

use std::fmt;

/// INIT header size in bytes (command + thread count + dimension).
pub const INIT_HEADER_SIZE: usize = 9;

/// Size of one matrix entry on the wire.
pub const ENTRY_SIZE: usize = 4;

/// Default maximum RESULT matrix payload (1 GB).
pub const DEFAULT_MAX_RESULT_PAYLOAD: u32 = 1_073_741_824;

/// Command byte constants.
pub mod command {
    /// Upload thread count and matrix.
    pub const INIT: u8 = 0x01;
    /// Start execution.
    pub const RUN: u8 = 0x02;
    /// Poll execution status.
    pub const CHECK: u8 = 0x03;
    /// Fetch the output matrix.
    pub const RESULT: u8 = 0x04;
}

/// Status byte constants.
pub mod status {
    pub const OK: u8 = 0x10;
    pub const ERR: u8 = 0x11;
    pub const BUSY: u8 = 0x12;
    pub const DONE: u8 = 0x13;
}

/// Request sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    Run,
    Check,
    Result,
}

impl Command {
    /// The tag byte this command is sent as.
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            Command::Init => command::INIT,
            Command::Run => command::RUN,
            Command::Check => command::CHECK,
            Command::Result => command::RESULT,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Init => "INIT",
            Command::Run => "RUN",
            Command::Check => "CHECK",
            Command::Result => "RESULT",
        };
        f.write_str(name)
    }
}

/// Status byte returned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
    Busy,
    Done,
}

impl Status {
    /// Parse a status byte. Unknown bytes return `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            status::OK => Some(Status::Ok),
            status::ERR => Some(Status::Err),
            status::BUSY => Some(Status::Busy),
            status::DONE => Some(Status::Done),
            _ => None,
        }
    }

    #[inline]
    pub fn as_byte(self) -> u8 {
        match self {
            Status::Ok => status::OK,
            Status::Err => status::ERR,
            Status::Busy => status::BUSY,
            Status::Done => status::DONE,
        }
    }
}

/// Decoded INIT header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitHeader {
    /// Worker thread-count hint.
    pub thread_count: u32,
    /// Matrix dimension N.
    pub dimension: u32,
}

impl InitHeader {
    pub fn new(thread_count: u32, dimension: u32) -> Self {
        Self {
            thread_count,
            dimension,
        }
    }

    /// Encode header to bytes (Big Endian), command byte included.
    ///
    /// # Example
    ///
    /// ```
    /// use offload_client::protocol::InitHeader;
    ///
    /// let bytes = InitHeader::new(4, 2).encode();
    /// assert_eq!(bytes, [0x01, 0, 0, 0, 4, 0, 0, 0, 2]);
    /// ```
    pub fn encode(&self) -> [u8; INIT_HEADER_SIZE] {
        let mut buf = [0u8; INIT_HEADER_SIZE];
        buf[0] = command::INIT;
        buf[1..5].copy_from_slice(&self.thread_count.to_be_bytes());
        buf[5..9].copy_from_slice(&self.dimension.to_be_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if the buffer is too short or does not start with the
    /// INIT command byte.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < INIT_HEADER_SIZE || buf[0] != command::INIT {
            return None;
        }
        let thread_count = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let dimension = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
        Some(Self {
            thread_count,
            dimension,
        })
    }

    /// Size of the matrix payload that follows this header, in bytes.
    pub fn payload_len(&self) -> Option<usize> {
        matrix_payload_len(self.dimension)
    }
}

/// Byte length of an `n`×`n` matrix on the wire, or `None` on overflow.
pub fn matrix_payload_len(dimension: u32) -> Option<usize> {
    let n = dimension as usize;
    n.checked_mul(n)?.checked_mul(ENTRY_SIZE)
}
