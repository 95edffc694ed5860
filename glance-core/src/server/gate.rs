//! Backpressure for the capture loop.
//!
//! At most one capture is outstanding. A tick that arrives while the
//! previous capture is still running is dropped and counted; nothing is
//! queued.

/// Warn once per this many consecutive skipped ticks.
pub const SKIP_WARN_EVERY: u64 = 10;

#[derive(Debug, Default, Clone)]
pub struct CaptureGate {
    in_progress: bool,
    skipped: u64,
    consecutive: u64,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for a new capture.
    ///
    /// Returns `false` (and counts a skip) if a capture is already running.
    pub fn try_begin(&mut self) -> bool {
        if self.in_progress {
            self.skipped += 1;
            self.consecutive += 1;
            return false;
        }
        self.in_progress = true;
        self.consecutive = 0;
        true
    }

    /// Release the gate, whether or not the capture produced a frame.
    pub fn finish(&mut self) {
        self.in_progress = false;
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Total skipped ticks since the last reset.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn consecutive_skips(&self) -> u64 {
        self.consecutive
    }

    /// Whether the current skip streak has hit a warning boundary.
    pub fn should_warn(&self) -> bool {
        self.consecutive > 0 && self.consecutive % SKIP_WARN_EVERY == 0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
