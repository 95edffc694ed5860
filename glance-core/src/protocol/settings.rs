//! Run-time tunables: capture cadence, quality and scale.
//!
//! The cadence is enforced by the server's timer. Quality and scale are
//! advisory: they are clamped, stored and handed to the frame source,
//! nothing more.

use std::time::Duration;

pub const MIN_FPS: i64 = 1;
pub const MAX_FPS: i64 = 4;
pub const DEFAULT_FPS: i64 = 2;

pub const MIN_INTERVAL: Duration = Duration::from_millis(250);
pub const MAX_INTERVAL: Duration = Duration::from_millis(2000);

pub const MIN_QUALITY: i64 = 10;
pub const MAX_QUALITY: i64 = 90;
pub const DEFAULT_QUALITY: u8 = 60;

pub const MIN_SCALE: f64 = 0.25;
pub const MAX_SCALE: f64 = 1.0;
pub const DEFAULT_SCALE: f64 = 1.0;

/// Capture interval for a requested frame rate.
///
/// A rate of zero or below has no meaningful period and maps to the
/// 250 ms floor. Otherwise the rate is clamped to `1..=4`, converted with
/// `round(1000 / fps)` and the result clamped to 250–2000 ms.
pub fn interval_for_fps(fps: i64) -> Duration {
    if fps < MIN_FPS {
        return MIN_INTERVAL;
    }
    let fps = fps.min(MAX_FPS);
    let millis = (1000.0 / fps as f64).round() as u64;
    Duration::from_millis(millis).clamp(MIN_INTERVAL, MAX_INTERVAL)
}

pub fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY) as u8
}

pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

// ── CaptureSettings ──────────────────────────────────────────────

/// The advisory knobs forwarded to the frame source on every capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// Encoder quality hint, 10–90.
    pub quality: u8,
    /// Capture scale factor, 0.25–1.0.
    pub scale: f64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            scale: DEFAULT_SCALE,
        }
    }
}

// ── StreamSettings ───────────────────────────────────────────────

/// Server-wide tunables, shared by every connected viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    interval: Duration,
    quality: u8,
    scale: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            interval: interval_for_fps(DEFAULT_FPS),
            quality: DEFAULT_QUALITY,
            scale: DEFAULT_SCALE,
        }
    }
}

impl StreamSettings {
    /// Build clamped settings from raw values.
    pub fn new(fps: i64, quality: i64, scale: f64) -> Self {
        let mut settings = Self::default();
        settings.set_fps(fps);
        settings.set_quality(quality);
        settings.set_scale(scale);
        settings
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Apply a `SET_FPS` request. Returns `true` if the interval changed.
    pub fn set_fps(&mut self, fps: i64) -> bool {
        let interval = interval_for_fps(fps);
        let changed = interval != self.interval;
        self.interval = interval;
        changed
    }

    pub fn set_quality(&mut self, quality: i64) {
        self.quality = clamp_quality(quality);
    }

    /// Non-finite values are ignored.
    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.scale = clamp_scale(scale);
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            quality: self.quality,
            scale: self.scale,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_clamped_before_conversion() {
        let ms = |fps| interval_for_fps(fps).as_millis();
        assert_eq!(ms(1), 1000);
        assert_eq!(ms(2), 500);
        assert_eq!(ms(3), 333);
        assert_eq!(ms(4), 250);
        assert_eq!(ms(100), 250);
    }

    #[test]
    fn non_positive_fps_maps_to_fastest_cadence() {
        assert_eq!(interval_for_fps(0), MIN_INTERVAL);
        assert_eq!(interval_for_fps(-7), MIN_INTERVAL);
        assert_eq!(interval_for_fps(i64::MIN), MIN_INTERVAL);

        let mut s = StreamSettings::new(1, 60, 1.0);
        assert!(s.set_fps(0));
        assert_eq!(s.interval(), Duration::from_millis(250));
    }

    #[test]
    fn quality_and_scale_clamp() {
        assert_eq!(clamp_quality(0), 10);
        assert_eq!(clamp_quality(55), 55);
        assert_eq!(clamp_quality(1000), 90);
        assert_eq!(clamp_scale(0.1), 0.25);
        assert_eq!(clamp_scale(0.6), 0.6);
        assert_eq!(clamp_scale(3.0), 1.0);
    }

    #[test]
    fn defaults_to_two_fps() {
        let s = StreamSettings::default();
        assert_eq!(s.interval(), Duration::from_millis(500));
    }

    #[test]
    fn set_fps_reports_change() {
        let mut s = StreamSettings::default();
        assert!(s.set_fps(4));
        assert!(!s.set_fps(40));
        assert_eq!(s.interval(), MIN_INTERVAL);
    }

    #[test]
    fn non_finite_scale_is_ignored() {
        let mut s = StreamSettings::new(2, 50, 0.5);
        s.set_scale(f64::NAN);
        assert_eq!(s.scale(), 0.5);
        assert_eq!(s.capture_settings().quality, 50);
    }
}
