//! Element discovery and mutation observation.
//!
//! This module keeps the registry of tracked media elements synchronized
//! with a mutating document: selector scans admit and prune elements,
//! and the mutation watcher coalesces change bursts into debounced
//! rescans while applying removals and source invalidations immediately.

mod registry;
mod scan;
mod watcher;

pub use registry::{TrackedElement, TrackedSet};
pub use scan::{
    is_source_attr, resolve_source, scan, ScanOutcome, DEFERRED_SOURCE_ATTRS, SOURCE_ATTRS,
};
pub use watcher::{EventDigest, MutationWatcher};
