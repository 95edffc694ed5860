//! Glance wire protocol vocabulary.
//!
//! Control lines are ASCII, `\n`-terminated and case-sensitive. Frames are
//! a `FRAME <len>\n` header followed by exactly `len` raw bytes with no
//! terminator.
//!
//! ```text
//! C→S  AUTH <password>\n
//! S→C  OK\n | FAIL\n
//! C→S  SET_FPS <int>\n | SET_QUALITY <int>\n | SET_SCALE <float>\n
//! S→C  FRAME <len>\n<len bytes>
//! ```

pub mod message;
pub mod settings;

use std::time::Duration;

pub use message::{ClientLine, ServerMessage, parse_frame_header};
pub use settings::{
    CaptureSettings, StreamSettings, clamp_quality, clamp_scale, interval_for_fps,
};

// ── Constants ────────────────────────────────────────────────────

/// Well-known listening port.
pub const DEFAULT_PORT: u16 = 7345;

/// Shared secret baked in at build time (`GLANCE_SECRET`), `"glance"` otherwise.
pub const DEFAULT_SECRET: &str = match option_env!("GLANCE_SECRET") {
    Some(secret) => secret,
    None => "glance",
};

/// Window with zero clients after which the server stops itself.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// TCP connect deadline used by the viewer.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest control or header line accepted before the peer is dropped.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Largest frame payload a viewer will buffer. The server never sends more.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;
