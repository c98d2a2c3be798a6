//! Mutation observation and rescan debouncing.
//!
//! Structural document changes schedule a rescan after a short quiet
//! period, coalescing mutation bursts into a single scan. A periodic
//! fallback rescan co-exists with the debounce because some engines fire
//! no mutation records for certain dynamic-loading patterns; both paths
//! funnel into the same scan.

use std::time::{Duration, Instant};

use crate::discovery::{is_source_attr, TrackedSet};
use crate::surface::{ElementId, PageEvent};

/// Tracked-element changes the engine must act on, distilled from one
/// batch of raw page events.
#[derive(Debug, Default)]
pub struct EventDigest {
    /// Tracked elements that left the document.
    pub removed: Vec<ElementId>,
    /// Tracked elements whose source changed and was invalidated.
    pub invalidated: Vec<ElementId>,
    /// Tracked elements whose rendered box changed size.
    pub resized: Vec<ElementId>,
}

/// Debounced rescan scheduling over drained page events.
#[derive(Debug)]
pub struct MutationWatcher {
    debounce: Duration,
    fallback_interval: Duration,
    last_mutation_at: Option<Instant>,
    last_scan_at: Option<Instant>,
}

impl MutationWatcher {
    /// Creates a watcher with the given quiet period and fallback timer.
    pub fn new(debounce: Duration, fallback_interval: Duration) -> Self {
        Self {
            debounce,
            fallback_interval,
            last_mutation_at: None,
            last_scan_at: None,
        }
    }

    /// Routes one batch of page events.
    ///
    /// Structural changes (insertions, removals, source-attribute edits)
    /// arm the debounce; removals and invalidations are applied to the
    /// registry immediately so no stale entry survives until the rescan.
    pub fn observe(
        &mut self,
        events: Vec<PageEvent>,
        tracked: &mut TrackedSet,
        now: Instant,
    ) -> EventDigest {
        let mut digest = EventDigest::default();
        for event in events {
            match event {
                PageEvent::ElementAdded(_) => {
                    self.last_mutation_at = Some(now);
                }
                PageEvent::ElementRemoved(id) => {
                    self.last_mutation_at = Some(now);
                    if tracked.remove(id).is_some() {
                        digest.removed.push(id);
                    }
                }
                PageEvent::AttributeChanged { id, name } => {
                    if is_source_attr(&name) {
                        self.last_mutation_at = Some(now);
                        if tracked.invalidate(id) {
                            digest.invalidated.push(id);
                        }
                    }
                }
                PageEvent::ElementResized(id) => {
                    if tracked.contains(id) {
                        digest.resized.push(id);
                    }
                }
            }
        }
        digest
    }

    /// True when a rescan should run now.
    ///
    /// Either the quiet period elapsed since the last mutation of a burst,
    /// or the fallback interval elapsed since the last scan. A watcher that
    /// has never scanned is always due.
    pub fn rescan_due(&self, now: Instant) -> bool {
        if let Some(last_mutation) = self.last_mutation_at {
            if now.duration_since(last_mutation) >= self.debounce {
                return true;
            }
        }
        match self.last_scan_at {
            None => true,
            Some(last_scan) => now.duration_since(last_scan) >= self.fallback_interval,
        }
    }

    /// Records a completed scan and disarms any pending burst.
    pub fn mark_scanned(&mut self, now: Instant) {
        self.last_scan_at = Some(now);
        self.last_mutation_at = None;
    }

    /// Clears all scheduling state (page teardown or restart).
    pub fn reset(&mut self) {
        self.last_mutation_at = None;
        self.last_scan_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::TrackedElement;
    use crate::surface::ElementKind;

    fn watcher() -> MutationWatcher {
        MutationWatcher::new(Duration::from_millis(250), Duration::from_secs(3))
    }

    fn tracked_with(raw: u64) -> TrackedSet {
        let mut set = TrackedSet::new();
        set.insert(TrackedElement::new(
            ElementId::new(raw),
            ElementKind::Image,
            "https://cdn/a.jpg".to_string(),
            None,
        ));
        set
    }

    #[test]
    fn test_burst_coalesces_into_one_rescan() {
        let mut watcher = watcher();
        let mut tracked = TrackedSet::new();
        let t0 = Instant::now();
        watcher.mark_scanned(t0);

        for offset in [0, 50, 100] {
            watcher.observe(
                vec![PageEvent::ElementAdded(ElementId::new(offset))],
                &mut tracked,
                t0 + Duration::from_millis(offset),
            );
        }

        // Quiet period counts from the burst's last record.
        assert!(!watcher.rescan_due(t0 + Duration::from_millis(200)));
        assert!(watcher.rescan_due(t0 + Duration::from_millis(350)));

        watcher.mark_scanned(t0 + Duration::from_millis(350));
        assert!(!watcher.rescan_due(t0 + Duration::from_millis(400)));
    }

    #[test]
    fn test_fallback_fires_without_mutations() {
        let mut watcher = watcher();
        let t0 = Instant::now();

        assert!(watcher.rescan_due(t0), "never-scanned watcher is due");
        watcher.mark_scanned(t0);

        assert!(!watcher.rescan_due(t0 + Duration::from_secs(2)));
        assert!(watcher.rescan_due(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_removal_destroys_tracked_entry() {
        let mut watcher = watcher();
        let mut tracked = tracked_with(9);
        let id = ElementId::new(9);

        let digest = watcher.observe(
            vec![PageEvent::ElementRemoved(id)],
            &mut tracked,
            Instant::now(),
        );

        assert_eq!(digest.removed, vec![id]);
        assert!(!tracked.contains(id));
    }

    #[test]
    fn test_source_attribute_change_invalidates() {
        let mut watcher = watcher();
        let mut tracked = tracked_with(4);
        let id = ElementId::new(4);
        tracked.record_sample(id, Instant::now());

        let digest = watcher.observe(
            vec![PageEvent::AttributeChanged {
                id,
                name: "src".to_string(),
            }],
            &mut tracked,
            Instant::now(),
        );

        assert_eq!(digest.invalidated, vec![id]);
        assert!(tracked.is_stale(id));
        assert!(tracked.get(id).unwrap().last_sample_at.is_none());
    }

    #[test]
    fn test_cosmetic_attribute_change_ignored() {
        let mut watcher = watcher();
        let mut tracked = tracked_with(4);
        let t0 = Instant::now();
        watcher.mark_scanned(t0);

        let digest = watcher.observe(
            vec![PageEvent::AttributeChanged {
                id: ElementId::new(4),
                name: "class".to_string(),
            }],
            &mut tracked,
            t0,
        );

        assert!(digest.invalidated.is_empty());
        assert!(!watcher.rescan_due(t0 + Duration::from_millis(300)));
    }

    #[test]
    fn test_resize_routed_only_for_tracked() {
        let mut watcher = watcher();
        let mut tracked = tracked_with(4);

        let digest = watcher.observe(
            vec![
                PageEvent::ElementResized(ElementId::new(4)),
                PageEvent::ElementResized(ElementId::new(77)),
            ],
            &mut tracked,
            Instant::now(),
        );

        assert_eq!(digest.resized, vec![ElementId::new(4)]);
    }
}
