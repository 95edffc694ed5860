//! Control lines and server messages.

use std::fmt;
use std::num::IntErrorKind;

use bytes::Bytes;

// ── ClientLine ───────────────────────────────────────────────────

/// A control line sent by a viewer.
///
/// Parsing is total: anything outside the grammar becomes
/// [`ClientLine::Unknown`] so the caller decides how strict to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientLine {
    /// `AUTH <password>`; must be the first line on a connection.
    Auth(String),
    /// `SET_FPS <int>`; clamped server-side.
    SetFps(i64),
    /// `SET_QUALITY <int>`; advisory.
    SetQuality(i64),
    /// `SET_SCALE <float>`; advisory.
    SetScale(f64),
    /// Anything else, kept verbatim for logging.
    Unknown(String),
}

impl ClientLine {
    /// Parse one line (without its terminator).
    pub fn parse(line: &str) -> Self {
        if let Some(password) = line.strip_prefix("AUTH ") {
            return Self::Auth(password.to_string());
        }
        if let Some(arg) = line.strip_prefix("SET_FPS ") {
            if let Ok(fps) = arg.trim().parse() {
                return Self::SetFps(fps);
            }
        } else if let Some(arg) = line.strip_prefix("SET_QUALITY ") {
            if let Ok(quality) = arg.trim().parse() {
                return Self::SetQuality(quality);
            }
        } else if let Some(arg) = line.strip_prefix("SET_SCALE ") {
            if let Ok(scale) = arg.trim().parse::<f64>() {
                if scale.is_finite() {
                    return Self::SetScale(scale);
                }
            }
        }
        Self::Unknown(line.to_string())
    }

    /// Whether this is a tunable command (`SET_*`).
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Self::SetFps(_) | Self::SetQuality(_) | Self::SetScale(_)
        )
    }
}

impl fmt::Display for ClientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(password) => write!(f, "AUTH {password}"),
            Self::SetFps(fps) => write!(f, "SET_FPS {fps}"),
            Self::SetQuality(quality) => write!(f, "SET_QUALITY {quality}"),
            Self::SetScale(scale) => write!(f, "SET_SCALE {scale}"),
            Self::Unknown(line) => f.write_str(line),
        }
    }
}

// ── ServerMessage ────────────────────────────────────────────────

/// A message written by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Authentication succeeded.
    Ok,
    /// Authentication failed; the connection is about to close.
    Fail,
    /// One encoded still image.
    Frame(Bytes),
}

/// Parse a `FRAME <size>` header line.
///
/// Returns `None` for anything else, including `FRAME 0`.
pub fn parse_frame_header(line: &str) -> Option<usize> {
    let size = match line.strip_prefix("FRAME ")?.parse::<usize>() {
        Ok(size) => size,
        // Saturate so the caller's size limit rejects it.
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => usize::MAX,
        Err(_) => return None,
    };
    (size > 0).then_some(size)
}

// ── Tests ────────────────────────────────────────────────────────
