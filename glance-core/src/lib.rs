//! # glance-core
//!
//! Core library for Glance, a screen-streaming server and viewer over raw
//! TCP for trusted networks.
//!
//! This crate contains:
//! - **Protocol**: control-line grammar, `FRAME` envelope, tunable clamping
//! - **Codec**: `ControlCodec` (server) and `ViewerCodec` (client) for
//!   framed TCP I/O via `tokio_util`
//! - **State**: per-connection handshake phases and viewer status
//! - **Server**: `StreamServer`, the capture/broadcast loop with
//!   backpressure and idle shutdown
//! - **Client**: `StreamClient`, handshake, frame parsing and statistics
//! - **Source**: the `FrameSource` seam for external capture/encoding
//! - **Error**: `GlanceError`, a typed `thiserror`-based error hierarchy

pub mod auth;
pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod server;
pub mod source;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use auth::AuthSecret;
pub use client::{ClientConfig, ClientEvent, DeliveryStats, StreamClient};
pub use codec::{ControlCodec, StreamEvent, ViewerCodec};
pub use error::GlanceError;
pub use protocol::{
    CaptureSettings, ClientLine, DEFAULT_PORT, DEFAULT_SECRET, ServerMessage, StreamSettings,
};
pub use server::{ServerConfig, ServerEvent, ServerStatus, StreamServer};
pub use source::{FrameSource, from_fn};
pub use state::{ConnectionStatus, SessionPhase};
