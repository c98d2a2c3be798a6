//! Overlay lifecycle: apply, realign, expire.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::position::compute_placement;
use super::state::ActiveOverlay;
use crate::surface::{ElementId, Intensity, PageSurface, SurfaceError};

/// Movement below this is layout jitter, not a reposition.
const REALIGN_EPSILON_PX: f64 = 0.5;

/// Owns every ACTIVE artifact on the page.
///
/// The map is keyed by element, which makes "at most one artifact per
/// element" structural rather than checked.
#[derive(Debug)]
pub struct OverlayManager {
    active: HashMap<ElementId, ActiveOverlay>,
    ttl: Duration,
    total_applied: u64,
    total_expired: u64,
}

impl OverlayManager {
    /// Creates a manager whose artifacts live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            active: HashMap::new(),
            ttl,
            total_applied: 0,
            total_expired: 0,
        }
    }

    /// Mounts an artifact covering `element`, replacing any prior one.
    ///
    /// Returns `Ok(false)` when the element can no longer be placed
    /// (detached between verdict and apply); the verdict is then moot.
    pub fn apply(
        &mut self,
        surface: &mut dyn PageSurface,
        element: ElementId,
        confidence: f32,
        intensity: Intensity,
        now: Instant,
    ) -> Result<bool, SurfaceError> {
        // Replace, never stack: the prior artifact goes down first.
        if let Some(prior) = self.active.remove(&element) {
            surface.remove_overlay(prior.handle);
        }

        let placement = match compute_placement(surface, element) {
            Some(placement) => placement,
            None => {
                tracing::debug!(%element, "No placement for overlay, element gone");
                return Ok(false);
            }
        };

        let handle = surface.mount_overlay(placement.context, placement.rect, intensity)?;
        self.active.insert(
            element,
            ActiveOverlay {
                element,
                handle,
                context: placement.context,
                rect: placement.rect,
                applied_at: now,
                expires_at: now + self.ttl,
                confidence,
            },
        );
        self.total_applied += 1;
        tracing::info!(%element, confidence, "Mitigation overlay applied");
        Ok(true)
    }

    /// Periodic maintenance: expire overdue artifacts, realign the rest.
    pub fn tick(&mut self, surface: &mut dyn PageSurface, now: Instant) {
        let elements: Vec<ElementId> = self.active.keys().copied().collect();
        for element in elements {
            let expired = self
                .active
                .get(&element)
                .is_some_and(|overlay| overlay.is_expired(now));
            if expired {
                if let Some(overlay) = self.active.remove(&element) {
                    surface.remove_overlay(overlay.handle);
                    self.total_expired += 1;
                    tracing::debug!(%element, "Overlay expired");
                }
                continue;
            }
            self.realign(surface, element);
        }
    }

    /// Realigns one element's artifact to its current geometry.
    pub fn on_element_resized(&mut self, surface: &mut dyn PageSurface, element: ElementId) {
        self.realign(surface, element);
    }

    /// Tears down the artifact of a removed element, if any.
    pub fn on_element_removed(&mut self, surface: &mut dyn PageSurface, element: ElementId) {
        if let Some(overlay) = self.active.remove(&element) {
            surface.remove_overlay(overlay.handle);
            tracing::debug!(%element, "Overlay torn down with its element");
        }
    }

    /// Tears down every artifact (disable, navigation, shutdown).
    pub fn teardown_all(&mut self, surface: &mut dyn PageSurface) {
        let count = self.active.len();
        for (_, overlay) in self.active.drain() {
            surface.remove_overlay(overlay.handle);
        }
        if count > 0 {
            tracing::info!(count, "All overlays torn down");
        }
    }

    /// True when `element` currently carries an artifact.
    pub fn has_overlay(&self, element: ElementId) -> bool {
        self.active.contains_key(&element)
    }

    /// The ACTIVE record for `element`, if any.
    pub fn get(&self, element: ElementId) -> Option<&ActiveOverlay> {
        self.active.get(&element)
    }

    /// Number of ACTIVE artifacts.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Artifact lifetime this manager was built with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Total artifacts ever applied.
    pub fn total_applied(&self) -> u64 {
        self.total_applied
    }

    /// Total artifacts torn down by expiry.
    pub fn total_expired(&self) -> u64 {
        self.total_expired
    }

    fn realign(&mut self, surface: &mut dyn PageSurface, element: ElementId) {
        let (handle, context, current) = match self.active.get(&element) {
            Some(overlay) => (overlay.handle, overlay.context, overlay.rect),
            None => return,
        };

        let fresh = match (surface.bounding_rect(element), surface.bounding_rect(context)) {
            (Some(element_rect), Some(context_rect)) => element_rect.relative_to(&context_rect),
            _ => {
                // Source or context left the document under us.
                surface.remove_overlay(handle);
                self.active.remove(&element);
                tracing::debug!(%element, "Overlay source vanished, torn down");
                return;
            }
        };

        if !fresh.approx_eq(&current, REALIGN_EPSILON_PX) {
            surface.update_overlay(handle, fresh);
            if let Some(overlay) = self.active.get_mut(&element) {
                overlay.rect = fresh;
            }
        }
    }
}
