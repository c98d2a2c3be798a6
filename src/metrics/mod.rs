//! Prometheus metrics exporter for the filtering pipeline.
//!
//! This module provides observability into the running engine by exposing
//! its statistics in Prometheus format via an HTTP endpoint. Gauges mirror
//! the pipeline's current state; counters track lifetime totals and are
//! advanced by delta so snapshots can be applied idempotently.
//!
//! # Metrics Exposed
//!
//! ## Pipeline State
//! - `pageveil_enabled` - Whether filtering is enabled (1/0)
//! - `pageveil_elements_tracked` - Media elements under observation
//! - `pageveil_queue_depth` - Samples waiting in the processing queue
//! - `pageveil_in_flight` - Submissions awaiting a verdict
//! - `pageveil_active_overlays` - Mitigation overlays currently mounted
//! - `pageveil_sampling_fps` - Current adaptive sampling rate
//! - `pageveil_service_latency_ms` - Smoothed service latency
//!
//! ## Lifetime Counters
//! - `pageveil_samples_captured_total` / `pageveil_samples_submitted_total`
//!   / `pageveil_samples_evicted_total` - Sample flow through the queue
//! - `pageveil_capture_errors_total` - Failed capture attempts
//! - `pageveil_verdicts_flagged_total` / `pageveil_verdicts_clean_total`
//!   / `pageveil_verdicts_discarded_total` - Verdict outcomes
//! - `pageveil_failures_transient_total` / `pageveil_failures_permanent_total`
//!   / `pageveil_retries_total` - Submission failure handling
//! - `pageveil_rate_adjustments_total` - Adaptive rate changes
//! - `pageveil_overlays_applied_total` / `pageveil_overlays_expired_total`
//!   - Overlay lifecycle
//! - `pageveil_scans_total` - Document scans performed
//!
//! # Example
//!
//! ```no_run
//! use pageveil::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! // registry.update(&snapshot) with snapshots from EngineHandle::stats,
//! // then serve registry.encode() output.
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
