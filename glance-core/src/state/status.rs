//! Viewer-side connection status, reported to the embedder on every change.

/// ```text
///  Disconnected ──► Connecting ──► Connected ──OK──► Authenticated
///       ▲                │              │                  │
///       └────────────────┴──────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    /// TCP connect in flight.
    Connecting,
    /// TCP established, AUTH sent, waiting for `OK`.
    Connected,
    /// Frames flowing; control commands accepted.
    Authenticated,
}

impl ConnectionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}
