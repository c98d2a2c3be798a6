//! Visual-surface abstraction over the hosting page.
//!
//! This module provides a trait-based boundary to the live document the
//! pipeline scans, so the same engine runs against a real page bridge and
//! against the scriptable [`MockPage`](super::MockPage) used in tests.

use super::RectPx;
use thiserror::Error;

/// Stable identity of one element within a page context.
///
/// Identities are assigned by the surface and never reused during the
/// lifetime of a page context; a removed element's id stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Wraps a raw surface-assigned identity.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element {}", self.0)
    }
}

/// The kind of visual content an element carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A playing or paused video element.
    Video,
    /// A static image element (including lazily-loaded ones).
    Image,
}

impl ElementKind {
    /// Short lowercase name used in logs and request context tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Video => "video",
            ElementKind::Image => "image",
        }
    }
}

/// Raw RGBA pixels grabbed from one element.
#[derive(Clone)]
pub struct PixelBuffer {
    /// Interleaved RGBA bytes, row-major.
    pub data: Vec<u8>,
    /// Buffer width in pixels.
    pub width: u32,
    /// Buffer height in pixels.
    pub height: u32,
}

impl PixelBuffer {
    /// Validates that the byte length matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Handle to a mounted obscuring artifact, assigned by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(u64);

impl OverlayHandle {
    /// Wraps a raw surface-assigned handle.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Visual strength of a mounted obscuring artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    /// Soft blur; underlying shapes stay recognizable.
    Light,
    /// Default blur strength.
    Medium,
    /// Opaque-grade blur plus pixelation.
    Heavy,
}

impl Default for Intensity {
    fn default() -> Self {
        Intensity::Medium
    }
}

/// One observed change to the document, drained via
/// [`PageSurface::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A node entered the document subtree.
    ElementAdded(ElementId),
    /// A node left the document subtree.
    ElementRemoved(ElementId),
    /// An attribute changed on an existing node.
    AttributeChanged {
        /// The affected element.
        id: ElementId,
        /// The attribute name, lowercase.
        name: String,
    },
    /// The element's rendered box changed size.
    ElementResized(ElementId),
}

/// Errors reported by a surface when reading from or drawing into the page.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("{0} is gone from the document")]
    Detached(ElementId),
    #[error("{0} has no decodable content yet")]
    NotReady(ElementId),
    #[error("{0} is security-tainted and cannot be sampled")]
    Tainted(ElementId),
    #[error("surface rejected the operation: {0}")]
    Rejected(String),
}

impl SurfaceError {
    /// True for failures expected to clear on their own (retry later).
    pub fn is_transient(&self) -> bool {
        matches!(self, SurfaceError::NotReady(_))
    }
}

/// Trait for page implementations.
///
/// Every method is a thin accessor over the hosting document; no pipeline
/// policy lives behind this boundary. The engine owns one surface per page
/// context and touches it only from its event loop.
pub trait PageSurface {
    /// Hostname of the document, used for site-profile selection.
    fn page_host(&self) -> String;

    /// Rectangle of the currently visible viewport.
    fn viewport(&self) -> RectPx;

    /// Elements currently in the document matching `selector`.
    ///
    /// Selector syntax is the host's; the pipeline treats selectors as
    /// opaque strings supplied by the site profile.
    fn query(&self, selector: &str) -> Vec<ElementId>;

    /// The media kind of an element, or `None` for non-media nodes.
    fn element_kind(&self, id: ElementId) -> Option<ElementKind>;

    /// Current value of an attribute, if present and non-empty.
    fn attribute(&self, id: ElementId, name: &str) -> Option<String>;

    /// The element's rendered rectangle, `None` once detached.
    fn bounding_rect(&self, id: ElementId) -> Option<RectPx>;

    /// Natural (intrinsic) pixel dimensions, when the media has loaded.
    fn natural_size(&self, id: ElementId) -> Option<(u32, u32)>;

    /// True while the element remains in the document.
    fn is_connected(&self, id: ElementId) -> bool;

    /// True when the element is rendered inside the viewport.
    fn is_visible(&self, id: ElementId) -> bool;

    /// True when the element has decodable content to rasterize.
    fn is_ready(&self, id: ElementId) -> bool;

    /// Grabs the element's current pixels.
    fn snapshot_pixels(&self, id: ElementId) -> Result<PixelBuffer, SurfaceError>;

    /// Parent element, `None` at the document root.
    fn parent(&self, id: ElementId) -> Option<ElementId>;

    /// True when the element establishes a positioning context.
    fn is_positioning_context(&self, id: ElementId) -> bool;

    /// Forces the element to establish a positioning context.
    fn ensure_positioning_context(&mut self, id: ElementId);

    /// Mounts an obscuring artifact inside `context`, covering `rect`
    /// (expressed relative to the context's top-left corner).
    fn mount_overlay(
        &mut self,
        context: ElementId,
        rect: RectPx,
        intensity: Intensity,
    ) -> Result<OverlayHandle, SurfaceError>;

    /// Moves or resizes a previously mounted artifact.
    fn update_overlay(&mut self, handle: OverlayHandle, rect: RectPx);

    /// Unmounts an artifact. Unknown handles are ignored.
    fn remove_overlay(&mut self, handle: OverlayHandle);

    /// Drains document change records observed since the last call.
    fn poll_events(&mut self) -> Vec<PageEvent>;
}
