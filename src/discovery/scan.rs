//! Document scanning and source resolution.
//!
//! A scan walks the surface with the profile's selector set, admits new
//! media elements into the registry, refreshes invalidated sources, and
//! prunes entries whose elements silently left the document. Scanning is
//! idempotent: rerunning it against an unchanged document admits nothing.

use std::collections::HashSet;

use crate::discovery::{TrackedElement, TrackedSet};
use crate::profile::SiteProfile;
use crate::surface::{ElementId, PageSurface};

/// Attributes checked for a deferred source, in order, before `src`.
///
/// Lazy-loading frameworks park the real URL in one of these until the
/// element scrolls near the viewport.
pub const DEFERRED_SOURCE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original", "data-url"];

/// Attributes whose change invalidates a tracked element's source.
pub const SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original", "data-url", "poster"];

/// True when a change to `name` means the element's content may differ.
pub fn is_source_attr(name: &str) -> bool {
    SOURCE_ATTRS.contains(&name)
}

/// What one scan did, for logging and stats.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Newly admitted elements.
    pub discovered: usize,
    /// Elements dropped because they were no longer connected.
    pub pruned: Vec<ElementId>,
    /// Candidates below the profile's minimum rendered size.
    pub skipped_small: usize,
    /// Candidates whose source could not be resolved.
    pub skipped_unresolved: usize,
}

/// Resolves an element's effective source URL.
///
/// Deferred-source attributes win over the plain `src` so that lazily
/// loaded elements are identified by their real content URL. Returns
/// `None` when nothing resolves, which skips the element.
pub fn resolve_source<S: PageSurface>(surface: &S, id: ElementId) -> Option<String> {
    for attr in DEFERRED_SOURCE_ATTRS {
        if let Some(value) = surface.attribute(id, attr) {
            return Some(value);
        }
    }
    surface.attribute(id, "src")
}

/// Scans the document and synchronizes the registry with it.
pub fn scan<S: PageSurface>(
    surface: &S,
    profile: &SiteProfile,
    tracked: &mut TrackedSet,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut seen: HashSet<ElementId> = HashSet::new();

    for selector in profile.selectors() {
        for id in surface.query(selector) {
            if !seen.insert(id) {
                continue;
            }
            if tracked.contains(id) {
                if tracked.is_stale(id) {
                    // Re-resolution failures stay stale and retry next scan.
                    if let Some(source) = resolve_source(surface, id) {
                        tracked.refresh_source(id, source);
                    }
                }
                continue;
            }

            let Some(kind) = surface.element_kind(id) else {
                continue;
            };
            let Some(rect) = surface.bounding_rect(id) else {
                continue;
            };
            if rect.shorter_side() < profile.min_element_px {
                outcome.skipped_small += 1;
                continue;
            }
            let Some(source) = resolve_source(surface, id) else {
                outcome.skipped_unresolved += 1;
                continue;
            };

            let natural = surface.natural_size(id);
            if tracked.insert(TrackedElement::new(id, kind, source, natural)) {
                outcome.discovered += 1;
            }
        }
    }

    for id in tracked.ids() {
        if !surface.is_connected(id) {
            tracked.remove(id);
            outcome.pruned.push(id);
        }
    }

    if outcome.discovered > 0 || !outcome.pruned.is_empty() {
        tracing::debug!(
            discovered = outcome.discovered,
            pruned = outcome.pruned.len(),
            tracked = tracked.len(),
            "Scan complete"
        );
    }
    outcome
}
