//! Per-site capability detection and tuning profiles.
//!
//! A page's hostname selects a [`SiteProfile`] from a data-driven lookup
//! table: discovery selectors, sampling-rate band, queue sizing, and
//! priority bias all come from the matched record. Unmatched hosts get the
//! default profile.

mod site;

pub use site::{
    PriorityBias, ProfileError, RateBand, SiteProfile, SiteProfileTable, BASE_SELECTORS,
};
