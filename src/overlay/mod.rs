//! Mitigation overlays mounted over flagged elements.

mod manager;
mod position;
mod state;

pub use manager::OverlayManager;
pub use position::{compute_placement, Placement};
pub use state::ActiveOverlay;
