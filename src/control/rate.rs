//! Adaptive sampling-rate control.
//!
//! The controller tracks service round-trip latency with an exponentially
//! weighted moving average and steers the sampling rate inside the active
//! profile's band: sustained slow responses back the rate off, sustained
//! fast responses let it creep back up. A burst of consecutive transport
//! failures cuts the rate to the band floor for a cooldown window; the
//! pre-cut rate is restored once the service answers again.

use std::time::{Duration, Instant};

use crate::profile::RateBand;

/// Weight of the newest observation in the latency average.
const EWMA_ALPHA: f64 = 0.3;
/// Average latency above this backs the rate off.
const SLOW_THRESHOLD: Duration = Duration::from_millis(1500);
/// Average latency below this lets the rate recover.
const FAST_THRESHOLD: Duration = Duration::from_millis(500);
/// Multiplier applied when backing off.
const BACKOFF_FACTOR: f64 = 0.8;
/// Multiplier applied when recovering.
const RECOVERY_FACTOR: f64 = 1.1;
/// Consecutive transient failures that trigger a rate cut.
const FAILURE_BURST: u32 = 3;
/// How long a failure cut pins the rate to the band floor.
const FAILURE_COOLDOWN: Duration = Duration::from_secs(10);

/// Steers the sampling rate from observed service behavior.
#[derive(Debug)]
pub struct RateController {
    band: RateBand,
    fps: f64,
    latency_estimate: Option<Duration>,
    consecutive_failures: u32,
    /// Rate in effect before a failure cut, restored after cooldown.
    saved_fps: Option<f64>,
    cooldown_until: Option<Instant>,
    total_adjustments: u64,
}

impl RateController {
    /// Creates a controller starting at the band's initial rate.
    pub fn new(band: RateBand) -> Self {
        let fps = band.clamp(band.initial_fps);
        Self {
            band,
            fps,
            latency_estimate: None,
            consecutive_failures: 0,
            saved_fps: None,
            cooldown_until: None,
            total_adjustments: 0,
        }
    }

    /// Current sampling rate in frames per second.
    #[inline]
    pub fn current_fps(&self) -> f64 {
        self.fps
    }

    /// Per-element interval between samples at the current rate.
    pub fn current_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Smoothed service latency, if any observation has arrived.
    pub fn latency_estimate(&self) -> Option<Duration> {
        self.latency_estimate
    }

    /// True while a failure cut is pinning the rate to the floor.
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Total rate adjustments made (for metrics).
    pub fn total_adjustments(&self) -> u64 {
        self.total_adjustments
    }

    /// Records a successful round trip and adjusts the rate.
    pub fn record_latency(&mut self, observed: Duration, now: Instant) {
        self.consecutive_failures = 0;

        let estimate = match self.latency_estimate {
            Some(previous) => {
                previous.mul_f64(1.0 - EWMA_ALPHA) + observed.mul_f64(EWMA_ALPHA)
            }
            None => observed,
        };
        self.latency_estimate = Some(estimate);

        if let Some(until) = self.cooldown_until {
            if now < until {
                // Pinned to the floor until the cooldown lapses.
                return;
            }
            self.cooldown_until = None;
            if let Some(saved) = self.saved_fps.take() {
                self.apply_rate(saved);
                tracing::info!(
                    fps = self.fps,
                    "Service recovered, sampling rate restored"
                );
            }
            return;
        }

        if estimate > SLOW_THRESHOLD {
            self.apply_rate(self.fps * BACKOFF_FACTOR);
        } else if estimate < FAST_THRESHOLD {
            self.apply_rate(self.fps * RECOVERY_FACTOR);
        }
    }

    /// Records a transient failure; a burst cuts the rate to the floor.
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        if self.consecutive_failures < FAILURE_BURST {
            return;
        }

        if self.cooldown_until.is_none() {
            self.saved_fps = Some(self.fps);
            self.fps = self.band.min_fps;
            tracing::warn!(
                failures = self.consecutive_failures,
                fps = self.fps,
                "Failure burst, sampling rate cut to floor"
            );
        }
        // Continued failures keep pushing the cooldown out.
        self.cooldown_until = Some(now + FAILURE_COOLDOWN);
    }

    /// Returns to the band's initial rate and forgets history.
    pub fn reset(&mut self) {
        self.fps = self.band.clamp(self.band.initial_fps);
        self.latency_estimate = None;
        self.consecutive_failures = 0;
        self.saved_fps = None;
        self.cooldown_until = None;
    }

    fn apply_rate(&mut self, requested: f64) {
        let next = self.band.clamp(requested);
        if (next - self.fps).abs() > f64::EPSILON {
            tracing::debug!(from = self.fps, to = next, "Sampling rate adjusted");
            self.total_adjustments += 1;
            self.fps = next;
        }
    }
}
