//! Per-connection handshake state machine used by the stream server.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::time::Instant;

use crate::error::GlanceError;

// ── SessionPhase ─────────────────────────────────────────────────

/// Where a server-side connection is in its lifecycle.
///
/// ```text
///  Unauthenticated ──AUTH ok──► Authenticated
///         │                          │
///         │ bad first line / EOF     │ EOF / write error / stop
///         ▼                          ▼
///       Closed ◄──────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Accepted, waiting for the first line.
    #[default]
    Unauthenticated,

    /// AUTH succeeded; the socket receives frames.
    Authenticated {
        /// When the handshake completed.
        since: Instant,
    },

    /// Terminal.
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::Authenticated { .. } => write!(f, "Authenticated"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the session has been authenticated.
    pub fn authenticated_for(&self) -> Option<std::time::Duration> {
        match self {
            Self::Authenticated { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Authenticated`.
    ///
    /// Valid from: `Unauthenticated`. A second AUTH is a violation.
    pub fn authenticate(&mut self) -> Result<(), GlanceError> {
        match self {
            Self::Unauthenticated => {
                *self = Self::Authenticated {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(GlanceError::ProtocolViolation(format!(
                "cannot authenticate: session is {self}"
            ))),
        }
    }

    /// Transition to `Closed`. Valid from any state; closing twice is a
    /// no-op that returns `false`.
    pub fn close(&mut self) -> bool {
        let was_open = !self.is_closed();
        *self = Self::Closed;
        was_open
    }
}

// ── Tests ────────────────────────────────────────────────────────
