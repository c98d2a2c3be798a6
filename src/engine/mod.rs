//! The filtering engine: one task owning the whole pipeline.
//!
//! The engine multiplexes four event sources over a single `select!`
//! loop: a maintenance tick (scan, capture, overlay upkeep), completed
//! classification flights, host control messages, and cancellation. All
//! pipeline state is owned by the loop, so nothing here needs a lock;
//! concurrency exists only in the bounded set of in-flight submissions.
//!
//! Each select turn produces a [`Turn`] value and handling happens after
//! the turn is chosen, keeping mutable access to the engine out of the
//! branch futures.

mod config;
mod context;
mod host;
mod stats;

pub use config::{ConfigError, EngineConfig, FileConfig, OutputConfig};
pub use host::{EngineHandle, HostError};
pub use stats::{PipelineStats, StatsSnapshot};

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureDecision, Sample};
use crate::classify::{Classifier, ClassifyError, ClassifyRequest, Verdict};
use crate::control::RetryPolicy;
use crate::discovery::scan;
use crate::profile::SiteProfileTable;
use crate::settings::{SettingsError, UserSettings};
use crate::surface::PageSurface;

use context::FilterContext;
use host::HostMessage;

/// Host control messages queued ahead of the loop.
const HOST_CHANNEL_CAPACITY: usize = 16;

/// What one select turn resolved to.
enum Turn {
    Tick,
    Flight(FlightOutcome),
    Host(Option<HostMessage>),
    Cancelled,
}

/// A completed classification flight.
struct FlightOutcome {
    sample: Sample,
    result: Result<Verdict, ClassifyError>,
    latency: Duration,
}

/// The page-media filtering engine.
///
/// Owns the surface, the per-page pipeline state, and the in-flight
/// submission set. Constructed together with the [`EngineHandle`] the
/// host uses to control it, then consumed by [`run`](Self::run).
pub struct FilterEngine<S: PageSurface> {
    surface: S,
    classifier: Arc<dyn Classifier>,
    config: EngineConfig,
    retry_policy: RetryPolicy,
    page_host: String,
    ctx: FilterContext,
    host_rx: mpsc::Receiver<HostMessage>,
    cancel: CancellationToken,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, FlightOutcome>>,
    /// Samples awaiting a retry slot, with their earliest resubmit time.
    retry_bin: Vec<(Instant, Sample)>,
}

impl<S: PageSurface> FilterEngine<S> {
    /// Builds an engine for the surface's page and a handle to drive it.
    ///
    /// The site profile is detected from the page host; `settings` seed
    /// the adjustable knobs and can be replaced at runtime through the
    /// handle.
    pub fn new(
        surface: S,
        classifier: Arc<dyn Classifier>,
        profiles: &SiteProfileTable,
        settings: UserSettings,
        config: EngineConfig,
    ) -> (Self, EngineHandle) {
        let page_host = surface.page_host();
        let profile = profiles.detect(&page_host).clone();
        let ctx = FilterContext::new(profile, settings, &config);

        let (tx, host_rx) = mpsc::channel(HOST_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = EngineHandle::new(tx, cancel.clone());

        let engine = Self {
            surface,
            classifier,
            retry_policy: config.retry_policy(),
            page_host,
            ctx,
            host_rx,
            cancel,
            in_flight: FuturesUnordered::new(),
            retry_bin: Vec::new(),
            config,
        };
        (engine, handle)
    }

    /// Runs the engine until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(
            host = %self.page_host,
            profile = %self.ctx.profile.key,
            slots = self.config.worker_slots,
            "Filter engine started"
        );

        // Log-only readiness probe; the pipeline starts either way and
        // transient-failure handling covers a degraded service.
        if !self.classifier.healthy().await {
            tracing::warn!("Classifier failed its readiness probe");
        }

        let mut ticker = tokio::time::interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let turn = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Turn::Cancelled,
                _ = ticker.tick() => Turn::Tick,
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    Turn::Flight(outcome)
                }
                message = self.host_rx.recv() => Turn::Host(message),
            };

            let now = tokio::time::Instant::now().into_std();
            match turn {
                Turn::Tick => self.on_tick(now),
                Turn::Flight(outcome) => self.on_outcome(outcome, now),
                Turn::Host(Some(message)) => self.on_host(message, now),
                Turn::Host(None) => {
                    tracing::info!("All engine handles dropped, stopping");
                    break;
                }
                Turn::Cancelled => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        self.ctx.overlays.teardown_all(&mut self.surface);
        tracing::info!(
            samples = self.ctx.stats.samples_captured,
            flagged = self.ctx.stats.verdicts_flagged,
            "Filter engine stopped"
        );
    }

    /// One maintenance turn: route events, rescan, capture, tend overlays.
    fn on_tick(&mut self, now: Instant) {
        let events = self.surface.poll_events();
        if !self.ctx.enabled() {
            // Events are still drained while disabled so the first
            // enabled tick does not replay a backlog of stale records.
            return;
        }

        let digest = self.ctx.watcher.observe(events, &mut self.ctx.tracked, now);
        for element in digest.removed {
            self.ctx.overlays.on_element_removed(&mut self.surface, element);
        }
        for element in digest.resized {
            self.ctx.overlays.on_element_resized(&mut self.surface, element);
        }

        if self.ctx.watcher.rescan_due(now) {
            let outcome = scan(&self.surface, &self.ctx.profile, &mut self.ctx.tracked);
            for element in outcome.pruned {
                self.ctx.overlays.on_element_removed(&mut self.surface, element);
            }
            self.ctx.watcher.mark_scanned(now);
            self.ctx.stats.scans += 1;
        }

        let interval = self.ctx.rate.current_interval();
        for decision in self.ctx.scheduler.due(&self.surface, &self.ctx.tracked, interval, now) {
            self.capture(decision, now);
        }

        self.ctx.overlays.tick(&mut self.surface, now);
        self.fill_slots(now);
    }

    /// Rasterizes one due element and queues the sample.
    fn capture(&mut self, decision: CaptureDecision, now: Instant) {
        let sampled = self.ctx.sampler.sample(
            &self.surface,
            decision.element,
            decision.kind,
            decision.priority,
            now,
        );
        match sampled {
            Ok(sample) => {
                self.ctx.stats.samples_captured += 1;
                self.ctx.tracked.record_sample(decision.element, now);
                self.ctx.tracked.mark_in_flight(decision.element);
                if let Some(evicted) = self.ctx.queue.enqueue(sample) {
                    // Eviction is terminal for that sample; its element
                    // becomes schedulable again.
                    self.ctx.tracked.clear_in_flight(evicted.element());
                    self.ctx.stats.samples_evicted += 1;
                }
            }
            Err(error) => {
                self.ctx.stats.capture_errors += 1;
                if !error.is_transient() {
                    self.ctx
                        .tracked
                        .mark_skip(decision.element, now + self.config.skip_cooldown());
                }
                tracing::debug!(element = %decision.element, error = %error, "Capture failed");
            }
        }
    }

    /// Tops the in-flight set up to the worker-slot bound.
    fn fill_slots(&mut self, now: Instant) {
        while self.in_flight.len() < self.config.worker_slots {
            let Some(sample) = self.next_submission(now) else {
                break;
            };
            let element = sample.element();
            if !self.ctx.tracked.contains(element) || !self.surface.is_connected(element) {
                self.ctx.tracked.clear_in_flight(element);
                tracing::trace!(%element, "Dropping sample for vanished element");
                continue;
            }
            self.submit(sample);
        }
    }

    /// Next sample to submit: due retries before fresh queue residents.
    fn next_submission(&mut self, now: Instant) -> Option<Sample> {
        let due = self
            .retry_bin
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, (at, _))| *at)
            .map(|(index, _)| index);
        if let Some(index) = due {
            return Some(self.retry_bin.remove(index).1);
        }
        self.ctx.queue.dequeue()
    }

    /// Starts one classification flight for `sample`.
    fn submit(&mut self, sample: Sample) {
        let request = ClassifyRequest {
            sample_id: sample.sample_id(),
            jpeg: sample.image().jpeg.clone(),
            threshold: self.ctx.threshold(),
            fast_mode: self.ctx.profile.fast_mode,
            page_host: self.page_host.clone(),
            categories: self.ctx.settings.mitigation.categories.clone(),
        };
        self.ctx.stats.samples_submitted += 1;

        let classifier = Arc::clone(&self.classifier);
        self.in_flight.push(
            async move {
                let started = tokio::time::Instant::now();
                let result = classifier.classify(request).await;
                FlightOutcome {
                    sample,
                    result,
                    latency: started.elapsed(),
                }
            }
            .boxed_local(),
        );
    }

    /// Settles one completed flight.
    fn on_outcome(&mut self, flight: FlightOutcome, now: Instant) {
        let element = flight.sample.element();
        let gone =
            !self.ctx.tracked.contains(element) || !self.surface.is_connected(element);

        match flight.result {
            Ok(verdict) => {
                self.ctx.rate.record_latency(flight.latency, now);
                self.ctx.tracked.clear_in_flight(element);
                if gone {
                    self.ctx.stats.verdicts_discarded += 1;
                    tracing::debug!(%element, "Verdict discarded, element vanished");
                } else if verdict.flagged {
                    self.ctx.stats.verdicts_flagged += 1;
                    if self.ctx.settings.mitigation.enabled {
                        let applied = self.ctx.overlays.apply(
                            &mut self.surface,
                            element,
                            verdict.confidence,
                            self.ctx.settings.mitigation.intensity,
                            now,
                        );
                        if let Err(error) = applied {
                            tracing::warn!(%element, error = %error, "Failed to mount overlay");
                        }
                    }
                } else {
                    self.ctx.stats.verdicts_clean += 1;
                }
            }
            Err(_) if gone => {
                self.ctx.tracked.clear_in_flight(element);
                tracing::trace!(%element, "Dropping failed submission for vanished element");
            }
            Err(error) if error.is_transient() => {
                self.ctx.rate.record_failure(now);
                self.ctx.stats.failures_transient += 1;
                let mut sample = flight.sample;
                match self.retry_policy.next_delay(sample.retries()) {
                    Some(delay) => {
                        sample.bump_retry();
                        self.ctx.stats.retries += 1;
                        tracing::debug!(
                            %element,
                            attempt = sample.retries(),
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Transient failure, retry scheduled"
                        );
                        // The element stays in flight until the retry
                        // settles, so the scheduler cannot double-sample.
                        self.retry_bin.push((now + delay, sample));
                    }
                    None => {
                        self.ctx.tracked.clear_in_flight(element);
                        tracing::debug!(%element, error = %error, "Retry budget exhausted");
                    }
                }
            }
            Err(error) => {
                self.ctx.stats.failures_permanent += 1;
                self.ctx.tracked.clear_in_flight(element);
                self.ctx
                    .tracked
                    .mark_skip(element, now + self.config.skip_cooldown());
                tracing::warn!(%element, error = %error, "Submission rejected, element skipped");
            }
        }

        self.fill_slots(now);
    }

    /// Answers one host request.
    fn on_host(&mut self, message: HostMessage, now: Instant) {
        match message {
            HostMessage::Ping(reply) => {
                let _ = reply.send(());
            }
            HostMessage::GetStats(reply) => {
                let _ = reply.send(self.snapshot(now));
            }
            HostMessage::SetEnabled(enabled, reply) => {
                self.set_enabled(enabled);
                let _ = reply.send(());
            }
            HostMessage::UpdateSettings(settings, reply) => {
                let _ = reply.send(self.update_settings(settings));
            }
            HostMessage::Restart(reply) => {
                self.restart_page_state();
                let _ = reply.send(());
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.ctx.settings.enabled == enabled {
            return;
        }
        self.ctx.settings.enabled = enabled;
        self.on_enabled_change(enabled);
    }

    fn update_settings(&mut self, settings: UserSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        let was_enabled = self.ctx.settings.enabled;
        let now_enabled = settings.enabled;
        self.ctx.apply_settings(settings);
        if was_enabled != now_enabled {
            self.on_enabled_change(now_enabled);
        }
        tracing::info!("Settings updated");
        Ok(())
    }

    fn on_enabled_change(&mut self, enabled: bool) {
        if enabled {
            // The watcher was reset on disable, so the next tick rescans.
            tracing::info!("Filtering enabled");
            return;
        }
        self.ctx.overlays.teardown_all(&mut self.surface);
        for sample in self.ctx.queue.clear() {
            self.ctx.tracked.clear_in_flight(sample.element());
        }
        self.retry_bin.clear();
        self.ctx.tracked.clear();
        self.ctx.watcher.reset();
        self.ctx.rate.reset();
        tracing::info!("Filtering disabled, page state cleared");
    }

    /// Drops all page-scoped state, as on a navigation.
    fn restart_page_state(&mut self) {
        self.ctx.overlays.teardown_all(&mut self.surface);
        self.ctx.reset_page_state();
        self.retry_bin.clear();
        tracing::info!("Page state reset");
    }

    fn snapshot(&self, now: Instant) -> StatsSnapshot {
        let stats = &self.ctx.stats;
        StatsSnapshot {
            started_at: stats.started_at,
            uptime_seconds: stats.uptime_seconds(now),
            enabled: self.ctx.enabled(),
            page_host: self.page_host.clone(),
            profile: self.ctx.profile.key.clone(),
            elements_tracked: self.ctx.tracked.len(),
            queue_depth: self.ctx.queue.len(),
            in_flight: self.in_flight.len(),
            active_overlays: self.ctx.overlays.active_count(),
            current_fps: self.ctx.rate.current_fps(),
            average_latency_ms: self
                .ctx
                .rate
                .latency_estimate()
                .map(|estimate| estimate.as_secs_f64() * 1000.0),
            rate_adjustments: self.ctx.rate.total_adjustments(),
            overlays_applied: self.ctx.overlays.total_applied(),
            overlays_expired: self.ctx.overlays.total_expired(),
            samples_captured: stats.samples_captured,
            samples_submitted: stats.samples_submitted,
            samples_evicted: stats.samples_evicted,
            capture_errors: stats.capture_errors,
            verdicts_flagged: stats.verdicts_flagged,
            verdicts_clean: stats.verdicts_clean,
            verdicts_discarded: stats.verdicts_discarded,
            failures_transient: stats.failures_transient,
            failures_permanent: stats.failures_permanent,
            retries: stats.retries,
            scans: stats.scans,
        }
    }
}
