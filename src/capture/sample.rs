//! Sample type representing one captured still awaiting classification.

use std::time::{Duration, Instant};

use crate::surface::{ElementId, ElementKind};

/// Queue priority of a sample.
///
/// High-priority samples dequeue first and displace normal ones under
/// queue pressure. An element's first sample after discovery or source
/// invalidation is High, so fresh content gets a verdict quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Steady-state resample.
    Normal,
    /// First look at new content, or aggressive site profile.
    High,
}

impl Priority {
    /// True for [`Priority::High`].
    #[inline]
    pub fn is_high(&self) -> bool {
        matches!(self, Priority::High)
    }
}

/// Encoded still image grabbed from one element.
#[derive(Clone)]
pub struct SampleImage {
    /// JPEG bytes at the configured quality.
    pub jpeg: Vec<u8>,
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for SampleImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("jpeg_bytes", &self.jpeg.len())
            .finish()
    }
}

/// One captured still plus pipeline metadata.
#[derive(Debug, Clone)]
pub struct Sample {
    sequence: u64,
    element: ElementId,
    kind: ElementKind,
    captured_at: Instant,
    priority: Priority,
    retries: u32,
    image: SampleImage,
}

impl Sample {
    /// Creates a sample with a zero retry count.
    pub fn new(
        sequence: u64,
        element: ElementId,
        kind: ElementKind,
        priority: Priority,
        image: SampleImage,
        captured_at: Instant,
    ) -> Self {
        Self {
            sequence,
            element,
            kind,
            captured_at,
            priority,
            retries: 0,
            image,
        }
    }

    /// Monotonic capture sequence number within the page context.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The element this sample was grabbed from.
    #[inline]
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// The element's media kind.
    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// When the pixels were grabbed.
    #[inline]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Queue priority.
    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Submission attempts already failed transiently.
    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The encoded image.
    #[inline]
    pub fn image(&self) -> &SampleImage {
        &self.image
    }

    /// Caller-assigned identifier sent to the classification service.
    pub fn sample_id(&self) -> String {
        format!("el{}-s{}", self.element.raw(), self.sequence)
    }

    /// Time since capture.
    pub fn age(&self, now: Instant) -> Duration {
        now.duration_since(self.captured_at)
    }

    /// Counts one more transient failure against this sample.
    pub fn bump_retry(&mut self) {
        self.retries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sequence: u64, raw_element: u64) -> Sample {
        Sample::new(
            sequence,
            ElementId::new(raw_element),
            ElementKind::Image,
            Priority::Normal,
            SampleImage {
                jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
                width: 2,
                height: 2,
            },
            Instant::now(),
        )
    }

    #[test]
    fn test_sample_id_format() {
        assert_eq!(sample(42, 12).sample_id(), "el12-s42");
    }

    #[test]
    fn test_retry_counter() {
        let mut s = sample(1, 1);
        assert_eq!(s.retries(), 0);
        s.bump_retry();
        s.bump_retry();
        assert_eq!(s.retries(), 2);
    }

    #[test]
    fn test_priority_helper() {
        assert!(Priority::High.is_high());
        assert!(!Priority::Normal.is_high());
    }
}
