//! Capture scheduling: which elements get a fresh sample on this tick.
//!
//! The scheduler never overlaps captures per element: an element with a
//! sample anywhere in the pipeline is suppressed, not queued behind
//! itself. Everything else is interval gating against the adaptive rate
//! and readiness checks against the live surface.

use std::time::{Duration, Instant};

use super::Priority;
use crate::discovery::{TrackedElement, TrackedSet};
use crate::profile::PriorityBias;
use crate::surface::{ElementId, ElementKind, PageSurface};

/// One element the engine should sample now.
#[derive(Debug, Clone, Copy)]
pub struct CaptureDecision {
    /// Element to rasterize.
    pub element: ElementId,
    /// Its media kind.
    pub kind: ElementKind,
    /// Queue priority for the resulting sample.
    pub priority: Priority,
}

/// Per-tick capture decisions over the tracked set.
#[derive(Debug)]
pub struct CaptureScheduler {
    bias: PriorityBias,
}

impl CaptureScheduler {
    /// Creates a scheduler with the site profile's priority bias.
    pub fn new(bias: PriorityBias) -> Self {
        Self { bias }
    }

    /// Returns the elements due for capture at `now`.
    ///
    /// `interval` is the current minimum inter-sample spacing owned by the
    /// rate controller. Results come high-priority first, then by element
    /// identity, so enqueue order is deterministic.
    pub fn due<S: PageSurface>(
        &self,
        surface: &S,
        tracked: &TrackedSet,
        interval: Duration,
        now: Instant,
    ) -> Vec<CaptureDecision> {
        let mut decisions: Vec<CaptureDecision> = tracked
            .iter()
            .filter(|element| self.eligible(element, interval, now))
            .filter(|element| {
                surface.is_connected(element.id)
                    && surface.is_visible(element.id)
                    && surface.is_ready(element.id)
            })
            .map(|element| CaptureDecision {
                element: element.id,
                kind: element.kind,
                priority: self.priority_for(element),
            })
            .collect();

        decisions.sort_by_key(|d| (!d.priority.is_high(), d.element));
        decisions
    }

    fn eligible(&self, element: &TrackedElement, interval: Duration, now: Instant) -> bool {
        if element.in_flight {
            return false;
        }
        if element.skip_until.is_some_and(|until| now < until) {
            return false;
        }
        match element.last_sample_at {
            Some(last) => now.duration_since(last) >= interval,
            None => true,
        }
    }

    fn priority_for(&self, element: &TrackedElement) -> Priority {
        if element.is_fresh() || self.bias == PriorityBias::Aggressive {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}
