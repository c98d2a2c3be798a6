//! Engine loop configuration.
//!
//! User settings supply the global knobs (target rate, quality,
//! sensitivity) and the site profile bounds them: the profile's rate band
//! clamps the target rate, and its quality ceiling caps the compression
//! quality. Everything here is loop plumbing rather than policy.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::control::RetryPolicy;
use crate::settings::UserSettings;

/// Timing and capacity knobs for the engine loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maintenance tick period in milliseconds.
    pub tick_period_ms: u64,
    /// Concurrent classification submissions (1 or 2).
    pub worker_slots: usize,
    /// Hard deadline for one submission in milliseconds.
    pub submit_deadline_ms: u64,
    /// Retries allowed per sample after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub retry_base_ms: u64,
    /// Overlay time-to-live in milliseconds.
    pub overlay_ttl_ms: u64,
    /// Quiet period after a mutation burst before rescanning.
    pub mutation_debounce_ms: u64,
    /// Rescan interval when no mutations arrive at all.
    pub fallback_rescan_ms: u64,
    /// Longest side of an encoded sample in pixels.
    pub max_sample_dimension: u32,
    /// How long a permanently failed element is skipped.
    pub skip_cooldown_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 250,      // 4 maintenance turns per second
            worker_slots: 2,
            submit_deadline_ms: 3000, // 3s
            max_retries: 2,
            retry_base_ms: 500,
            overlay_ttl_ms: 5000,     // 5s
            mutation_debounce_ms: 250,
            fallback_rescan_ms: 3000, // 3s
            max_sample_dimension: 640,
            skip_cooldown_ms: 30_000, // 30s
        }
    }
}

impl EngineConfig {
    /// Maintenance tick period.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Submission deadline.
    pub fn submit_deadline(&self) -> Duration {
        Duration::from_millis(self.submit_deadline_ms)
    }

    /// Overlay time-to-live.
    pub fn overlay_ttl(&self) -> Duration {
        Duration::from_millis(self.overlay_ttl_ms)
    }

    /// Mutation-burst quiet period.
    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    /// Mutation-independent rescan interval.
    pub fn fallback_rescan(&self) -> Duration {
        Duration::from_millis(self.fallback_rescan_ms)
    }

    /// Skip window after a permanent per-element failure.
    pub fn skip_cooldown(&self) -> Duration {
        Duration::from_millis(self.skip_cooldown_ms)
    }

    /// Retry policy for transient submission failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_ms),
            ..RetryPolicy::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_slots == 0 || self.worker_slots > 2 {
            return Err(ConfigError::InvalidWorkerSlots(self.worker_slots));
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::InvalidTickPeriod);
        }
        if self.submit_deadline_ms == 0 {
            return Err(ConfigError::InvalidDeadline);
        }
        if self.overlay_ttl_ms == 0 {
            return Err(ConfigError::InvalidOverlayTtl);
        }
        if self.mutation_debounce_ms > self.fallback_rescan_ms {
            return Err(ConfigError::InvalidRescanWindow);
        }
        if self.max_sample_dimension < 16 {
            return Err(ConfigError::InvalidSampleDimension(self.max_sample_dimension));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("worker slots must be 1 or 2, got {0}")]
    InvalidWorkerSlots(usize),
    #[error("tick period must be nonzero")]
    InvalidTickPeriod,
    #[error("submission deadline must be nonzero")]
    InvalidDeadline,
    #[error("overlay time-to-live must be nonzero")]
    InvalidOverlayTtl,
    #[error("mutation debounce cannot exceed the fallback rescan interval")]
    InvalidRescanWindow,
    #[error("max sample dimension {0} is too small")]
    InvalidSampleDimension(u32),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] crate::settings::SettingsError),
}

/// Demo-run output knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Run until interrupted (true) or for `duration_secs` (false).
    pub continuous: bool,
    /// Run length in seconds when not continuous.
    pub duration_secs: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            duration_secs: 30,
            metrics_port: 9090,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.engine.validate()?;
        config.settings.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_slots_bounded() {
        let mut config = EngineConfig::default();

        config.worker_slots = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerSlots(0))
        ));

        config.worker_slots = 3;
        assert!(config.validate().is_err());

        config.worker_slots = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debounce_must_fit_rescan_window() {
        let mut config = EngineConfig::default();
        config.mutation_debounce_ms = 5000;
        config.fallback_rescan_ms = 3000;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRescanWindow)
        ));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = EngineConfig::default();
        config.max_retries = 1;
        config.retry_base_ms = 200;

        let policy = config.retry_policy();

        assert_eq!(policy.next_delay(0), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(1), None);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [engine]
            worker_slots = 1
            submit_deadline_ms = 5000

            [settings]
            compression_quality = 55
            "#,
        )
        .unwrap();

        assert_eq!(parsed.engine.worker_slots, 1);
        assert_eq!(parsed.engine.submit_deadline_ms, 5000);
        assert_eq!(parsed.engine.tick_period_ms, 250);
        assert_eq!(parsed.settings.compression_quality, 55);
        assert_eq!(parsed.output.metrics_port, 9090);
    }
}
