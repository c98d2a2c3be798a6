//! Site capability detection.
//!
//! Per-site tuning is data, not branching: a lookup table maps host
//! suffixes to profile records, with a default profile for everything
//! else. Detection is a pure function of page identity.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Selectors applied on every site before profile additions.
pub const BASE_SELECTORS: &[&str] = &["video", "img"];

/// How a site's samples are prioritized for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBias {
    /// Steady-state samples queue at normal priority.
    Normal,
    /// Every sample from this site queues at high priority.
    Aggressive,
}

/// Allowed sampling-rate band in frames per second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateBand {
    /// Floor the adaptive controller may not go below.
    pub min_fps: f64,
    /// Ceiling the adaptive controller may not exceed.
    pub max_fps: f64,
    /// Rate a fresh page context starts at.
    pub initial_fps: f64,
}

impl RateBand {
    /// Clamps a requested rate into this band.
    #[inline]
    pub fn clamp(&self, fps: f64) -> f64 {
        fps.clamp(self.min_fps, self.max_fps)
    }
}

impl Default for RateBand {
    fn default() -> Self {
        Self {
            min_fps: 0.25,
            max_fps: 2.0,
            initial_fps: 1.0,
        }
    }
}

/// Tuning record for one class of sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Short name used in logs and request context tags.
    pub key: String,
    /// Host suffixes this profile claims ("youtube.com" claims subdomains).
    pub host_suffixes: Vec<String>,
    /// Selectors added to [`BASE_SELECTORS`] for this site class.
    pub extra_selectors: Vec<String>,
    /// Sampling-rate band.
    pub rate: RateBand,
    /// Queue priority applied to this site's samples.
    pub priority_bias: PriorityBias,
    /// Processing-queue capacity for this site class.
    pub queue_capacity: usize,
    /// Site ceiling for sample JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Elements with a shorter side below this are treated as decoration.
    pub min_element_px: f64,
    /// Ask the service for its reduced-accuracy fast path.
    pub fast_mode: bool,
}

impl SiteProfile {
    /// All selectors for this profile: the base set plus additions.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        BASE_SELECTORS
            .iter()
            .copied()
            .chain(self.extra_selectors.iter().map(String::as_str))
    }

    /// Validates profile parameters.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.rate.min_fps <= 0.0
            || self.rate.min_fps > self.rate.initial_fps
            || self.rate.initial_fps > self.rate.max_fps
            || self.rate.max_fps > 30.0
        {
            return Err(ProfileError::InvalidRateBand(self.key.clone()));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ProfileError::InvalidQuality(self.key.clone()));
        }
        if self.queue_capacity == 0 {
            return Err(ProfileError::InvalidQueueCapacity(self.key.clone()));
        }
        Ok(())
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            key: "default".to_string(),
            host_suffixes: Vec::new(),
            extra_selectors: vec!["img[data-src]".to_string()],
            rate: RateBand::default(),
            priority_bias: PriorityBias::Normal,
            queue_capacity: 10,
            jpeg_quality: 70,
            min_element_px: 48.0,
            fast_mode: false,
        }
    }
}

/// Profile validation and loading errors.
#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    #[error("invalid rate band in profile '{0}'")]
    InvalidRateBand(String),
    #[error("invalid jpeg quality in profile '{0}' (must be 1-100)")]
    InvalidQuality(String),
    #[error("invalid queue capacity in profile '{0}'")]
    InvalidQueueCapacity(String),
    #[error("failed to read profile file: {0}")]
    FileReadError(String),
    #[error("failed to parse profile file: {0}")]
    ParseError(String),
}

/// Lookup table mapping host suffixes to site profiles.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SiteProfileTable {
    /// Profiles checked in order; first suffix match wins.
    #[serde(default)]
    pub profiles: Vec<SiteProfile>,
    /// Profile for hosts no entry claims.
    #[serde(default)]
    pub default: SiteProfile,
}

impl SiteProfileTable {
    /// The compiled-in table covering common site classes.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                SiteProfile {
                    key: "video".to_string(),
                    host_suffixes: vec![
                        "youtube.com".to_string(),
                        "vimeo.com".to_string(),
                        "twitch.tv".to_string(),
                        "dailymotion.com".to_string(),
                    ],
                    extra_selectors: vec!["video[poster]".to_string()],
                    rate: RateBand {
                        min_fps: 0.5,
                        max_fps: 4.0,
                        initial_fps: 2.0,
                    },
                    priority_bias: PriorityBias::Aggressive,
                    queue_capacity: 10,
                    jpeg_quality: 60,
                    min_element_px: 48.0,
                    fast_mode: true,
                },
                SiteProfile {
                    key: "social".to_string(),
                    host_suffixes: vec![
                        "twitter.com".to_string(),
                        "x.com".to_string(),
                        "reddit.com".to_string(),
                        "instagram.com".to_string(),
                        "facebook.com".to_string(),
                    ],
                    extra_selectors: vec![
                        "img[data-src]".to_string(),
                        "img[data-lazy-src]".to_string(),
                    ],
                    rate: RateBand::default(),
                    priority_bias: PriorityBias::Aggressive,
                    queue_capacity: 10,
                    jpeg_quality: 70,
                    min_element_px: 48.0,
                    fast_mode: false,
                },
                SiteProfile {
                    key: "gallery".to_string(),
                    host_suffixes: vec![
                        "imgur.com".to_string(),
                        "flickr.com".to_string(),
                        "pinterest.com".to_string(),
                    ],
                    extra_selectors: vec!["img[data-original]".to_string()],
                    rate: RateBand {
                        min_fps: 0.2,
                        max_fps: 1.0,
                        initial_fps: 0.5,
                    },
                    priority_bias: PriorityBias::Normal,
                    queue_capacity: 8,
                    jpeg_quality: 80,
                    min_element_px: 48.0,
                    fast_mode: false,
                },
            ],
            default: SiteProfile::default(),
        }
    }

    /// Returns the profile claiming `host`, or the default profile.
    ///
    /// Matching is suffix-based with subdomain awareness: "youtube.com"
    /// claims "m.youtube.com" but not "notyoutube.com".
    pub fn detect(&self, host: &str) -> &SiteProfile {
        self.profiles
            .iter()
            .find(|p| {
                p.host_suffixes
                    .iter()
                    .any(|suffix| host == suffix || host.ends_with(&format!(".{suffix}")))
            })
            .unwrap_or(&self.default)
    }

    /// Loads a table from a TOML file and validates every entry.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ProfileError::FileReadError(e.to_string()))?;
        let table: SiteProfileTable =
            toml::from_str(&content).map_err(|e| ProfileError::ParseError(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    /// Validates the default profile and every table entry.
    pub fn validate(&self) -> Result<(), ProfileError> {
        self.default.validate()?;
        for profile in &self.profiles {
            profile.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_valid() {
        assert!(SiteProfileTable::builtin().validate().is_ok());
        assert!(SiteProfile::default().validate().is_ok());
    }

    #[test]
    fn test_detect_with_subdomains() {
        let table = SiteProfileTable::builtin();

        assert_eq!(table.detect("youtube.com").key, "video");
        assert_eq!(table.detect("m.youtube.com").key, "video");
        assert_eq!(table.detect("www.reddit.com").key, "social");
        assert_eq!(table.detect("example.org").key, "default");
    }

    #[test]
    fn test_suffix_requires_label_boundary() {
        let table = SiteProfileTable::builtin();
        assert_eq!(table.detect("notyoutube.com").key, "default");
    }

    #[test]
    fn test_selectors_include_base_set() {
        let profile = SiteProfile::default();
        let selectors: Vec<&str> = profile.selectors().collect();

        assert!(selectors.contains(&"video"));
        assert!(selectors.contains(&"img"));
        assert!(selectors.contains(&"img[data-src]"));
    }

    #[test]
    fn test_invalid_band_rejected() {
        let mut profile = SiteProfile::default();
        profile.rate.min_fps = 3.0; // above initial
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::InvalidRateBand(_))
        ));
    }

    #[test]
    fn test_table_parses_from_toml() {
        let text = r#"
            [[profiles]]
            key = "video"
            host_suffixes = ["example-video.com"]
            extra_selectors = ["video[poster]"]
            rate = { min_fps = 0.5, max_fps = 4.0, initial_fps = 2.0 }
            priority_bias = "aggressive"
            queue_capacity = 12
            jpeg_quality = 60
            min_element_px = 48.0
            fast_mode = true

            [default]
            key = "default"
            host_suffixes = []
            extra_selectors = []
            rate = { min_fps = 0.5, max_fps = 2.0, initial_fps = 1.0 }
            priority_bias = "normal"
            queue_capacity = 6
            jpeg_quality = 75
            min_element_px = 32.0
            fast_mode = false
        "#;
        let table: SiteProfileTable = toml::from_str(text).unwrap();

        assert!(table.validate().is_ok());
        assert_eq!(table.detect("www.example-video.com").key, "video");
        assert_eq!(table.detect("other.com").queue_capacity, 6);
    }
}
