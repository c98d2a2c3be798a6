//! Per-page pipeline state.
//!
//! Everything scoped to one page context lives here: the element
//! registry, queue, rate controller, overlay bookkeeping, and lifetime
//! counters. The engine loop owns exactly one context and rebuilds its
//! page-scoped parts on restart; lifetime counters survive.

use crate::capture::{CaptureScheduler, GeometrySampler};
use crate::control::RateController;
use crate::discovery::{MutationWatcher, TrackedSet};
use crate::overlay::OverlayManager;
use crate::profile::{RateBand, SiteProfile};
use crate::queue::ProcessingQueue;
use crate::settings::UserSettings;

use super::config::EngineConfig;
use super::stats::PipelineStats;

/// Pipeline state for one page under one settings record.
pub(crate) struct FilterContext {
    pub(crate) profile: SiteProfile,
    pub(crate) settings: UserSettings,
    pub(crate) tracked: TrackedSet,
    pub(crate) queue: ProcessingQueue,
    pub(crate) rate: RateController,
    pub(crate) overlays: OverlayManager,
    pub(crate) watcher: MutationWatcher,
    pub(crate) scheduler: CaptureScheduler,
    pub(crate) sampler: GeometrySampler,
    pub(crate) stats: PipelineStats,
}

impl FilterContext {
    pub(crate) fn new(profile: SiteProfile, settings: UserSettings, config: &EngineConfig) -> Self {
        let band = effective_band(&profile, &settings);
        let quality = effective_quality(&profile, &settings);
        Self {
            tracked: TrackedSet::new(),
            queue: ProcessingQueue::new(profile.queue_capacity),
            rate: RateController::new(band),
            overlays: OverlayManager::new(config.overlay_ttl()),
            watcher: MutationWatcher::new(config.mutation_debounce(), config.fallback_rescan()),
            scheduler: CaptureScheduler::new(profile.priority_bias),
            sampler: GeometrySampler::new(config.max_sample_dimension, quality),
            stats: PipelineStats::new(),
            profile,
            settings,
        }
    }

    /// Rebuilds page-scoped state, as on a navigation.
    ///
    /// Lifetime counters remain; the caller tears down mounted overlays
    /// against the surface first, since the manager rebuilt here has
    /// forgotten them.
    pub(crate) fn reset_page_state(&mut self) {
        let band = effective_band(&self.profile, &self.settings);
        self.tracked = TrackedSet::new();
        self.queue = ProcessingQueue::new(self.profile.queue_capacity);
        self.rate = RateController::new(band);
        self.overlays = OverlayManager::new(self.overlays.ttl());
        self.watcher.reset();
    }

    /// Applies a validated settings record.
    ///
    /// The rate controller restarts inside the new effective band; tracked
    /// elements, queued samples, and overlays are unaffected.
    pub(crate) fn apply_settings(&mut self, settings: UserSettings) {
        self.settings = settings;
        self.sampler
            .set_quality(effective_quality(&self.profile, &self.settings));
        self.rate = RateController::new(effective_band(&self.profile, &self.settings));
    }

    /// Confidence threshold sent with every classification request.
    #[inline]
    pub(crate) fn threshold(&self) -> f32 {
        self.settings.detection_sensitivity
    }

    /// Whether capture and classification run at all.
    #[inline]
    pub(crate) fn enabled(&self) -> bool {
        self.settings.enabled
    }
}

/// The profile's rate band, starting at the user's requested rate
/// clamped into it.
fn effective_band(profile: &SiteProfile, settings: &UserSettings) -> RateBand {
    RateBand {
        min_fps: profile.rate.min_fps,
        max_fps: profile.rate.max_fps,
        initial_fps: profile.rate.clamp(settings.target_frame_rate),
    }
}

/// Sample JPEG quality: the user's choice, capped by the site profile.
fn effective_quality(profile: &SiteProfile, settings: &UserSettings) -> u8 {
    profile.jpeg_quality.min(settings.compression_quality)
}
