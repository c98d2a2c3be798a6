//! Metrics collection and registry.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::engine::StatsSnapshot;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for the filtering pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Pipeline state gauges
    enabled: IntGauge,
    elements_tracked: IntGauge,
    queue_depth: IntGauge,
    in_flight: IntGauge,
    active_overlays: IntGauge,
    sampling_fps: Gauge,
    service_latency_ms: Gauge,

    // Lifetime counters
    samples_captured: IntCounter,
    samples_submitted: IntCounter,
    samples_evicted: IntCounter,
    capture_errors: IntCounter,
    verdicts_flagged: IntCounter,
    verdicts_clean: IntCounter,
    verdicts_discarded: IntCounter,
    failures_transient: IntCounter,
    failures_permanent: IntCounter,
    retries: IntCounter,
    rate_adjustments: IntCounter,
    overlays_applied: IntCounter,
    overlays_expired: IntCounter,
    scans: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        // Pipeline state gauges
        let enabled = IntGauge::new(
            "pageveil_enabled",
            "Whether filtering is enabled (1=enabled, 0=disabled)",
        )?;
        let elements_tracked = IntGauge::new(
            "pageveil_elements_tracked",
            "Media elements currently under observation",
        )?;
        let queue_depth = IntGauge::new(
            "pageveil_queue_depth",
            "Samples waiting in the processing queue",
        )?;
        let in_flight = IntGauge::new(
            "pageveil_in_flight",
            "Submissions currently awaiting a verdict",
        )?;
        let active_overlays = IntGauge::new(
            "pageveil_active_overlays",
            "Mitigation overlays currently mounted",
        )?;
        let sampling_fps = Gauge::new(
            "pageveil_sampling_fps",
            "Current adaptive sampling rate in frames per second",
        )?;
        let service_latency_ms = Gauge::new(
            "pageveil_service_latency_ms",
            "Smoothed classification service latency in milliseconds",
        )?;

        // Lifetime counters
        let samples_captured = IntCounter::new(
            "pageveil_samples_captured_total",
            "Samples captured and encoded",
        )?;
        let samples_submitted = IntCounter::new(
            "pageveil_samples_submitted_total",
            "Samples submitted to the classification service",
        )?;
        let samples_evicted = IntCounter::new(
            "pageveil_samples_evicted_total",
            "Samples displaced from the queue under pressure",
        )?;
        let capture_errors = IntCounter::new(
            "pageveil_capture_errors_total",
            "Capture attempts that failed at the surface or encoder",
        )?;
        let verdicts_flagged = IntCounter::new(
            "pageveil_verdicts_flagged_total",
            "Verdicts that flagged the sample",
        )?;
        let verdicts_clean = IntCounter::new(
            "pageveil_verdicts_clean_total",
            "Verdicts that cleared the sample",
        )?;
        let verdicts_discarded = IntCounter::new(
            "pageveil_verdicts_discarded_total",
            "Verdicts discarded because the element had vanished",
        )?;
        let failures_transient = IntCounter::new(
            "pageveil_failures_transient_total",
            "Transient submission failures",
        )?;
        let failures_permanent = IntCounter::new(
            "pageveil_failures_permanent_total",
            "Permanent submission failures",
        )?;
        let retries = IntCounter::new(
            "pageveil_retries_total",
            "Retries scheduled after transient failures",
        )?;
        let rate_adjustments = IntCounter::new(
            "pageveil_rate_adjustments_total",
            "Sampling-rate adjustments made by the controller",
        )?;
        let overlays_applied = IntCounter::new(
            "pageveil_overlays_applied_total",
            "Mitigation overlays ever applied",
        )?;
        let overlays_expired = IntCounter::new(
            "pageveil_overlays_expired_total",
            "Overlays torn down by expiry",
        )?;
        let scans = IntCounter::new("pageveil_scans_total", "Document scans performed")?;

        registry.register(Box::new(enabled.clone()))?;
        registry.register(Box::new(elements_tracked.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(active_overlays.clone()))?;
        registry.register(Box::new(sampling_fps.clone()))?;
        registry.register(Box::new(service_latency_ms.clone()))?;
        registry.register(Box::new(samples_captured.clone()))?;
        registry.register(Box::new(samples_submitted.clone()))?;
        registry.register(Box::new(samples_evicted.clone()))?;
        registry.register(Box::new(capture_errors.clone()))?;
        registry.register(Box::new(verdicts_flagged.clone()))?;
        registry.register(Box::new(verdicts_clean.clone()))?;
        registry.register(Box::new(verdicts_discarded.clone()))?;
        registry.register(Box::new(failures_transient.clone()))?;
        registry.register(Box::new(failures_permanent.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(rate_adjustments.clone()))?;
        registry.register(Box::new(overlays_applied.clone()))?;
        registry.register(Box::new(overlays_expired.clone()))?;
        registry.register(Box::new(scans.clone()))?;

        Ok(Self {
            registry,
            enabled,
            elements_tracked,
            queue_depth,
            in_flight,
            active_overlays,
            sampling_fps,
            service_latency_ms,
            samples_captured,
            samples_submitted,
            samples_evicted,
            capture_errors,
            verdicts_flagged,
            verdicts_clean,
            verdicts_discarded,
            failures_transient,
            failures_permanent,
            retries,
            rate_adjustments,
            overlays_applied,
            overlays_expired,
            scans,
        })
    }

    /// Updates all metrics from an engine statistics snapshot.
    pub fn update(&self, snapshot: &StatsSnapshot) {
        self.enabled.set(if snapshot.enabled { 1 } else { 0 });
        self.elements_tracked.set(snapshot.elements_tracked as i64);
        self.queue_depth.set(snapshot.queue_depth as i64);
        self.in_flight.set(snapshot.in_flight as i64);
        self.active_overlays.set(snapshot.active_overlays as i64);
        self.sampling_fps.set(snapshot.current_fps);
        if let Some(latency_ms) = snapshot.average_latency_ms {
            self.service_latency_ms.set(latency_ms);
        }

        // Counters only move forward; apply the delta against the
        // snapshot's lifetime totals.
        advance(&self.samples_captured, snapshot.samples_captured);
        advance(&self.samples_submitted, snapshot.samples_submitted);
        advance(&self.samples_evicted, snapshot.samples_evicted);
        advance(&self.capture_errors, snapshot.capture_errors);
        advance(&self.verdicts_flagged, snapshot.verdicts_flagged);
        advance(&self.verdicts_clean, snapshot.verdicts_clean);
        advance(&self.verdicts_discarded, snapshot.verdicts_discarded);
        advance(&self.failures_transient, snapshot.failures_transient);
        advance(&self.failures_permanent, snapshot.failures_permanent);
        advance(&self.retries, snapshot.retries);
        advance(&self.rate_adjustments, snapshot.rate_adjustments);
        advance(&self.overlays_applied, snapshot.overlays_applied);
        advance(&self.overlays_expired, snapshot.overlays_expired);
        advance(&self.scans, snapshot.scans);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Advances a counter to a lifetime total observed in a snapshot.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
