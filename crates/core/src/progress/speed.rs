//! Throughput smoothing for streamed transfers.

use std::time::Duration;

use tokio::time::Instant;

/// Samples closer together than this are coalesced into the next one.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Weight of the newest sample in the moving average.
pub const SMOOTHING_FACTOR: f64 = 0.3;

/// Exponential-moving-average throughput estimator.
///
/// The first accepted sample seeds the estimate directly; later samples are
/// blended as `speed = α·instant + (1-α)·previous`.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    speed: f64,
    seeded: bool,
    window_start: Option<Instant>,
    window_bytes: u64,
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedEstimator {
    pub fn new() -> Self {
        Self {
            speed: 0.0,
            seeded: false,
            window_start: None,
            window_bytes: 0,
        }
    }

    /// Current smoothed speed in bytes/second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Feed one sample. Returns the new estimate, or `None` if the sample
    /// was too short to count and the caller should keep accumulating.
    pub fn sample(&mut self, bytes: u64, elapsed: Duration) -> Option<f64> {
        if elapsed < MIN_SAMPLE_INTERVAL {
            return None;
        }

        let instant = bytes as f64 / elapsed.as_secs_f64();
        if self.seeded {
            self.speed = SMOOTHING_FACTOR * instant + (1.0 - SMOOTHING_FACTOR) * self.speed;
        } else {
            self.speed = instant;
            self.seeded = true;
        }
        Some(self.speed)
    }

    /// Record `bytes` transferred at `now`, sampling once enough time has
    /// passed since the last accepted sample.
    pub fn observe(&mut self, bytes: u64, now: Instant) -> Option<f64> {
        let start = *self.window_start.get_or_insert(now);
        self.window_bytes += bytes;

        let speed = self.sample(self.window_bytes, now.duration_since(start))?;
        self.window_start = Some(now);
        self.window_bytes = 0;
        Some(speed)
    }

    /// Estimated time to move `remaining` bytes at the current speed.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        if self.speed <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining as f64 / self.speed).ok()
    }

    /// Forget the running estimate.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Render an ETA the way progress messages show it ("42s", "3m", "1h 5m").
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
