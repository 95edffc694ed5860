//! Domain-specific error types for the Glance stream protocol.
//!
//! All fallible operations return `Result<T, GlanceError>`.
//! Malformed input never panics: it degrades to "drop this connection".

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// The canonical error type for Glance.
#[derive(Debug, Error)]
pub enum GlanceError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// The server answered the AUTH line with something other than `OK`.
    #[error("authentication rejected by server: {0:?}")]
    AuthRejected(String),

    /// A control line grew past the permitted length without a newline.
    #[error("control line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    /// A line violated the protocol grammar (strict mode only).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A `FRAME` header announced more bytes than a viewer will buffer.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}
