//! Registry of elements under observation.
//!
//! Membership is the attachment state: an element stays in the registry
//! exactly while it remains in the document, and removal destroys the
//! entry. Identity never changes across source invalidation.

use std::collections::HashMap;
use std::time::Instant;

use crate::surface::{ElementId, ElementKind};

/// One element currently monitored for capture.
#[derive(Debug, Clone)]
pub struct TrackedElement {
    /// Surface identity.
    pub id: ElementId,
    /// Media kind.
    pub kind: ElementKind,
    /// Source URL resolved at discovery time.
    pub source: String,
    /// Intrinsic dimensions when the media reported them.
    pub natural_size: Option<(u32, u32)>,
    /// When the last sample was captured.
    pub last_sample_at: Option<Instant>,
    /// Set while a sample for this element is queued or awaiting a verdict.
    pub in_flight: bool,
    /// Capture suppressed until this deadline after a permanent failure.
    pub skip_until: Option<Instant>,
    /// Source changed since discovery; the next scan re-resolves it.
    pub stale_source: bool,
    /// Samples taken since discovery or the last invalidation.
    pub samples_taken: u64,
}

impl TrackedElement {
    /// Creates a fresh entry for a newly discovered element.
    pub fn new(
        id: ElementId,
        kind: ElementKind,
        source: String,
        natural_size: Option<(u32, u32)>,
    ) -> Self {
        Self {
            id,
            kind,
            source,
            natural_size,
            last_sample_at: None,
            in_flight: false,
            skip_until: None,
            stale_source: false,
            samples_taken: 0,
        }
    }

    /// True when this element has never produced a sample since it was
    /// discovered or last invalidated.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.samples_taken == 0
    }
}

/// The set of tracked elements for one page context.
///
/// Discovery writes it, the scheduler reads it, and the engine flips
/// in-flight state; all from the single event loop.
#[derive(Debug, Default)]
pub struct TrackedSet {
    elements: HashMap<ElementId, TrackedElement>,
}

impl TrackedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a newly discovered element.
    ///
    /// Idempotent: returns false and leaves existing state untouched when
    /// the element is already tracked, so repeated scans never reset an
    /// element's sampling history.
    pub fn insert(&mut self, element: TrackedElement) -> bool {
        if self.elements.contains_key(&element.id) {
            return false;
        }
        self.elements.insert(element.id, element);
        true
    }

    /// True when the element is tracked.
    #[inline]
    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Read access to one entry.
    pub fn get(&self, id: ElementId) -> Option<&TrackedElement> {
        self.elements.get(&id)
    }

    /// Destroys an entry, returning it if it existed.
    pub fn remove(&mut self, id: ElementId) -> Option<TrackedElement> {
        self.elements.remove(&id)
    }

    /// Invalidates a tracked element after its source changed.
    ///
    /// Identity and any in-flight sample survive; sampling history, skip
    /// cooldown, and priority freshness reset, and the source is marked
    /// stale for re-resolution. Returns false for untracked ids.
    pub fn invalidate(&mut self, id: ElementId) -> bool {
        match self.elements.get_mut(&id) {
            Some(element) => {
                element.last_sample_at = None;
                element.skip_until = None;
                element.stale_source = true;
                element.samples_taken = 0;
                true
            }
            None => false,
        }
    }

    /// Replaces the stored source after a successful re-resolution.
    pub fn refresh_source(&mut self, id: ElementId, source: String) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.source = source;
            element.stale_source = false;
        }
    }

    /// True when the element's source needs re-resolution.
    pub fn is_stale(&self, id: ElementId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.stale_source)
    }

    /// Marks a sample as queued or awaiting a verdict.
    pub fn mark_in_flight(&mut self, id: ElementId) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.in_flight = true;
        }
    }

    /// Clears the in-flight mark after a terminal outcome.
    pub fn clear_in_flight(&mut self, id: ElementId) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.in_flight = false;
        }
    }

    /// Suppresses capture for the element until `until`.
    pub fn mark_skip(&mut self, id: ElementId, until: Instant) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.skip_until = Some(until);
        }
    }

    /// Records a completed capture at `at`.
    pub fn record_sample(&mut self, id: ElementId, at: Instant) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.last_sample_at = Some(at);
            element.samples_taken += 1;
        }
    }

    /// Number of tracked elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when nothing is tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedElement> {
        self.elements.values()
    }

    /// Snapshot of all tracked ids, for iteration while mutating.
    pub fn ids(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = self.elements.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drops every entry (page teardown).
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(raw: u64) -> TrackedElement {
        TrackedElement::new(
            ElementId::new(raw),
            ElementKind::Image,
            format!("https://cdn.example/{raw}.jpg"),
            None,
        )
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut set = TrackedSet::new();
        let id = ElementId::new(7);

        assert!(set.insert(entry(7)));
        set.record_sample(id, Instant::now());

        // Re-inserting must not reset sampling history.
        assert!(!set.insert(entry(7)));
        assert_eq!(set.get(id).unwrap().samples_taken, 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_invalidate_preserves_identity_and_in_flight() {
        let mut set = TrackedSet::new();
        let id = ElementId::new(3);
        set.insert(entry(3));

        let now = Instant::now();
        set.record_sample(id, now);
        set.mark_in_flight(id);
        set.mark_skip(id, now + Duration::from_secs(30));

        assert!(set.invalidate(id));

        let element = set.get(id).unwrap();
        assert!(element.in_flight, "in-flight sample must survive");
        assert!(element.last_sample_at.is_none());
        assert!(element.skip_until.is_none());
        assert!(element.stale_source);
        assert!(element.is_fresh());
    }

    #[test]
    fn test_invalidate_untracked_is_noop() {
        let mut set = TrackedSet::new();
        assert!(!set.invalidate(ElementId::new(99)));
    }

    #[test]
    fn test_refresh_source_clears_staleness() {
        let mut set = TrackedSet::new();
        let id = ElementId::new(5);
        set.insert(entry(5));
        set.invalidate(id);

        set.refresh_source(id, "https://cdn.example/new.jpg".to_string());

        assert!(!set.is_stale(id));
        assert_eq!(set.get(id).unwrap().source, "https://cdn.example/new.jpg");
    }

    #[test]
    fn test_remove_destroys_entry() {
        let mut set = TrackedSet::new();
        let id = ElementId::new(4);
        set.insert(entry(4));

        assert!(set.remove(id).is_some());
        assert!(!set.contains(id));
        assert!(set.remove(id).is_none());
    }
}
