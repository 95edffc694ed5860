//! Delivery statistics for a viewer.

use std::time::Instant;

/// Updated once per delivered frame (not per header).
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    /// Total frames delivered since connect.
    pub frames_received: u64,
    /// Total payload bytes delivered since connect.
    pub bytes_received: u64,
    /// When the most recent frame was delivered.
    pub last_frame_at: Option<Instant>,
    /// Instantaneous rate: `1000 / ms since the previous frame`.
    pub fps: f64,
}

impl DeliveryStats {
    pub fn record(&mut self, bytes: usize, now: Instant) {
        if let Some(previous) = self.last_frame_at {
            let millis = now.saturating_duration_since(previous).as_secs_f64() * 1000.0;
            if millis > 0.0 {
                self.fps = 1000.0 / millis;
            }
        }
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
        self.last_frame_at = Some(now);
    }
}
