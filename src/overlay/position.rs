//! Overlay placement against the page's positioning contexts.

use crate::surface::{ElementId, PageSurface, RectPx};

/// Where an artifact should be mounted to cover an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Positioning context to mount into.
    pub context: ElementId,
    /// Covering rectangle, relative to the context's top-left corner.
    pub rect: RectPx,
}

/// Computes the mount point covering `element` exactly.
///
/// Walks ancestors for the nearest node that already establishes a
/// positioning context; when none does, one is synthesized on the
/// immediate parent. Returns `None` when the element (or every possible
/// context) has left the document.
pub fn compute_placement(
    surface: &mut dyn PageSurface,
    element: ElementId,
) -> Option<Placement> {
    let element_rect = surface.bounding_rect(element)?;

    let mut cursor = surface.parent(element);
    let mut context = None;
    while let Some(node) = cursor {
        if surface.is_positioning_context(node) {
            context = Some(node);
            break;
        }
        cursor = surface.parent(node);
    }

    let context = match context {
        Some(found) => found,
        None => {
            let parent = surface.parent(element)?;
            surface.ensure_positioning_context(parent);
            parent
        }
    };

    let context_rect = surface.bounding_rect(context)?;
    Some(Placement {
        context,
        rect: element_rect.relative_to(&context_rect),
    })
}
