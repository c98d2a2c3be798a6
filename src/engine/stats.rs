//! Lifetime counters and the host-facing statistics snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

/// Counters the engine accumulates over its whole life.
///
/// These survive page resets and enable/disable cycles; page-scoped state
/// (tracked elements, queue residents) lives in the components and is
/// reported per snapshot instead.
#[derive(Debug)]
pub struct PipelineStats {
    /// Wall-clock start, echoed in snapshots.
    pub started_at: DateTime<Utc>,
    pub(crate) started_instant: Instant,
    /// Samples successfully captured and encoded.
    pub samples_captured: u64,
    /// Samples handed to the classifier.
    pub samples_submitted: u64,
    /// Samples displaced from the queue under pressure.
    pub samples_evicted: u64,
    /// Capture attempts that failed at the surface or encoder.
    pub capture_errors: u64,
    /// Verdicts that flagged the sample.
    pub verdicts_flagged: u64,
    /// Verdicts that cleared the sample.
    pub verdicts_clean: u64,
    /// Verdicts discarded because the element had vanished.
    pub verdicts_discarded: u64,
    /// Transient submission failures (timeouts, transport, 5xx).
    pub failures_transient: u64,
    /// Permanent submission failures (rejections, malformed replies).
    pub failures_permanent: u64,
    /// Retries scheduled for transient failures.
    pub retries: u64,
    /// Document scans performed.
    pub scans: u64,
}

impl PipelineStats {
    /// Starts all counters at zero, stamped with the current time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started_instant: Instant::now(),
            samples_captured: 0,
            samples_submitted: 0,
            samples_evicted: 0,
            capture_errors: 0,
            verdicts_flagged: 0,
            verdicts_clean: 0,
            verdicts_discarded: 0,
            failures_transient: 0,
            failures_permanent: 0,
            retries: 0,
            scans: 0,
        }
    }

    /// Seconds elapsed since the engine started.
    pub fn uptime_seconds(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.started_instant).as_secs()
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the whole pipeline, answering `get-stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Wall-clock engine start.
    pub started_at: DateTime<Utc>,
    /// Seconds since engine start.
    pub uptime_seconds: u64,
    /// Whether filtering is currently enabled.
    pub enabled: bool,
    /// Host of the page under filter.
    pub page_host: String,
    /// Key of the active site profile.
    pub profile: String,
    /// Elements currently tracked.
    pub elements_tracked: usize,
    /// Samples waiting in the queue.
    pub queue_depth: usize,
    /// Submissions currently awaiting a verdict.
    pub in_flight: usize,
    /// Overlays currently mounted.
    pub active_overlays: usize,
    /// Current adaptive sampling rate.
    pub current_fps: f64,
    /// Smoothed service latency in milliseconds.
    pub average_latency_ms: Option<f64>,
    /// Rate adjustments made by the controller.
    pub rate_adjustments: u64,
    /// Overlays ever applied.
    pub overlays_applied: u64,
    /// Overlays torn down by expiry.
    pub overlays_expired: u64,
    /// Lifetime counter: samples captured.
    pub samples_captured: u64,
    /// Lifetime counter: samples submitted.
    pub samples_submitted: u64,
    /// Lifetime counter: samples evicted.
    pub samples_evicted: u64,
    /// Lifetime counter: capture failures.
    pub capture_errors: u64,
    /// Lifetime counter: flagged verdicts.
    pub verdicts_flagged: u64,
    /// Lifetime counter: clean verdicts.
    pub verdicts_clean: u64,
    /// Lifetime counter: verdicts discarded late.
    pub verdicts_discarded: u64,
    /// Lifetime counter: transient failures.
    pub failures_transient: u64,
    /// Lifetime counter: permanent failures.
    pub failures_permanent: u64,
    /// Lifetime counter: retries scheduled.
    pub retries: u64,
    /// Lifetime counter: scans performed.
    pub scans: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_uptime_counts_forward_only() {
        let stats = PipelineStats::new();
        let later = stats.started_instant + Duration::from_secs(90);

        assert_eq!(stats.uptime_seconds(later), 90);
        assert_eq!(stats.uptime_seconds(stats.started_instant), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = StatsSnapshot {
            started_at: Utc::now(),
            uptime_seconds: 12,
            enabled: true,
            page_host: "example.com".to_string(),
            profile: "default".to_string(),
            elements_tracked: 3,
            queue_depth: 1,
            in_flight: 2,
            active_overlays: 1,
            current_fps: 1.0,
            average_latency_ms: Some(250.0),
            rate_adjustments: 4,
            overlays_applied: 2,
            overlays_expired: 1,
            samples_captured: 40,
            samples_submitted: 38,
            samples_evicted: 2,
            capture_errors: 0,
            verdicts_flagged: 2,
            verdicts_clean: 30,
            verdicts_discarded: 1,
            failures_transient: 4,
            failures_permanent: 1,
            retries: 3,
            scans: 20,
        };

        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["page_host"], "example.com");
        assert_eq!(json["in_flight"], 2);
        assert_eq!(json["verdicts_flagged"], 2);
        assert!(json["started_at"].is_string());
    }
}
