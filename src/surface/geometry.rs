//! Pixel-space geometry shared by discovery, capture, and overlay placement.

/// An axis-aligned rectangle in page pixel coordinates.
///
/// All rectangles produced by a [`PageSurface`](super::PageSurface) share one
/// coordinate space (viewport-relative), so the difference of two rectangles
/// yields a position relative to the other element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectPx {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels (may be fractional after layout).
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl RectPx {
    /// Creates a rectangle from its left/top corner and dimensions.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true when the rectangle covers no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Returns the length of the shorter side.
    #[inline]
    pub fn shorter_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Returns the covered area in square pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Returns true when this rectangle overlaps `other` by any amount.
    pub fn intersects(&self, other: &RectPx) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Returns this rectangle shifted by the given deltas.
    pub fn translated(&self, dx: f64, dy: f64) -> RectPx {
        RectPx::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Re-expresses this rectangle relative to `origin`'s top-left corner.
    pub fn relative_to(&self, origin: &RectPx) -> RectPx {
        self.translated(-origin.x, -origin.y)
    }

    /// Compares two rectangles within `epsilon` pixels on every component.
    ///
    /// Layout engines report sub-pixel jitter; overlay realignment treats
    /// movement below half a pixel as no movement.
    pub fn approx_eq(&self, other: &RectPx, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}
