//! Visual-surface boundary and geometry.
//!
//! This module defines the narrow interface the pipeline uses to touch the
//! hosting page: querying elements, reading geometry and pixels, mounting
//! obscuring artifacts, and draining document change records. Production
//! embeddings implement [`PageSurface`] over a real document bridge; tests
//! and the demo use the scriptable [`MockPage`].

mod geometry;
mod mock;
mod page;

pub use geometry::RectPx;
pub use mock::{MockPage, MountedArtifact};
pub use page::{
    ElementId, ElementKind, Intensity, OverlayHandle, PageEvent, PageSurface, PixelBuffer,
    SurfaceError,
};
