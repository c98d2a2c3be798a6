//! Per-element overlay state.

use std::time::Instant;

use crate::surface::{ElementId, OverlayHandle, RectPx};

/// One ACTIVE mitigation artifact.
///
/// The manager keys these by element, so an element can never hold two
/// artifacts at once; replacing a verdict's artifact goes through teardown
/// of the prior one.
#[derive(Debug, Clone)]
pub struct ActiveOverlay {
    /// Element being obscured.
    pub element: ElementId,
    /// Surface handle of the mounted artifact.
    pub handle: OverlayHandle,
    /// Positioning context the artifact is mounted in.
    pub context: ElementId,
    /// Artifact rectangle, relative to the context.
    pub rect: RectPx,
    /// When the artifact was mounted.
    pub applied_at: Instant,
    /// Hard teardown deadline.
    pub expires_at: Instant,
    /// Confidence of the verdict that caused this artifact.
    pub confidence: f32,
}

impl ActiveOverlay {
    /// True at or after the teardown deadline.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let overlay = ActiveOverlay {
            element: ElementId::new(1),
            handle: OverlayHandle::new(1),
            context: ElementId::new(2),
            rect: RectPx::new(0.0, 0.0, 10.0, 10.0),
            applied_at: now,
            expires_at: now + Duration::from_secs(5),
            confidence: 0.9,
        };

        assert!(!overlay.is_expired(now + Duration::from_millis(4999)));
        assert!(overlay.is_expired(now + Duration::from_secs(5)));
        assert!(overlay.is_expired(now + Duration::from_secs(6)));
    }
}
