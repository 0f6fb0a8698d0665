//! Transport module - TCP connection to the worker.
//!
//! The session itself only needs an `AsyncRead` and an `AsyncWrite`; this
//! module is the convenience path for the usual TCP deployment.

mod tcp;

pub use tcp::{connect, Connection, DEFAULT_SERVER_ADDR};
