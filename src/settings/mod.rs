//! User settings record.
//!
//! The host owns the settings store; this crate only defines the record,
//! reads it at startup, and applies it again on `update-settings`
//! notifications. The record is flat apart from the nested mitigation
//! policy, and deserializes from the host's JSON as well as from TOML.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::surface::Intensity;

/// Settings validation and parsing errors.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("invalid target frame rate (must be 0-30 fps)")]
    InvalidFrameRate,
    #[error("invalid compression quality (must be 1-100)")]
    InvalidQuality,
    #[error("invalid detection sensitivity (must be 0.0-1.0)")]
    InvalidSensitivity,
    #[error("failed to parse settings: {0}")]
    ParseError(String),
}

/// How flagged regions are obscured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MitigationPolicy {
    /// Master switch for mounting overlays at all.
    pub enabled: bool,
    /// Blur strength of mounted artifacts.
    pub intensity: Intensity,
    /// Content categories the user wants mitigated, forwarded to the
    /// service with each request for servers that honor them.
    pub categories: Vec<String>,
}

impl Default for MitigationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: Intensity::Medium,
            categories: vec!["explicit".to_string(), "suggestive".to_string()],
        }
    }
}

/// The user-facing configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Whether the pipeline captures and classifies at all.
    pub enabled: bool,
    /// Requested sampling rate; the site profile's band clamps it.
    pub target_frame_rate: f64,
    /// JPEG quality for sample encoding (1-100); the site profile caps it.
    pub compression_quality: u8,
    /// Confidence threshold sent with every classification request.
    pub detection_sensitivity: f32,
    /// Overlay policy.
    pub mitigation: MitigationPolicy,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_frame_rate: 1.0,
            compression_quality: 70,
            detection_sensitivity: 0.5,
            mitigation: MitigationPolicy::default(),
        }
    }
}

impl UserSettings {
    /// Validates the record's numeric ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.target_frame_rate <= 0.0 || self.target_frame_rate > 30.0 {
            return Err(SettingsError::InvalidFrameRate);
        }
        if self.compression_quality == 0 || self.compression_quality > 100 {
            return Err(SettingsError::InvalidQuality);
        }
        if !(0.0..=1.0).contains(&self.detection_sensitivity) {
            return Err(SettingsError::InvalidSensitivity);
        }
        Ok(())
    }

    /// Parses and validates a host-delivered JSON record.
    ///
    /// Missing fields fall back to defaults, so partial updates stay
    /// harmless.
    pub fn from_json(payload: &str) -> Result<Self, SettingsError> {
        let settings: UserSettings =
            serde_json::from_str(payload).map_err(|e| SettingsError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        assert!(UserSettings::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut settings = UserSettings::default();
        settings.compression_quality = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidQuality)
        ));

        let mut settings = UserSettings::default();
        settings.detection_sensitivity = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidSensitivity)
        ));
    }

    #[test]
    fn test_from_json_partial_record() {
        let settings =
            UserSettings::from_json(r#"{"enabled": false, "detection_sensitivity": 0.8}"#)
                .unwrap();

        assert!(!settings.enabled);
        assert_eq!(settings.detection_sensitivity, 0.8);
        // Unspecified fields keep their defaults.
        assert_eq!(settings.compression_quality, 70);
        assert!(settings.mitigation.enabled);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(matches!(
            UserSettings::from_json(r#"{"target_frame_rate": -2.0}"#),
            Err(SettingsError::InvalidFrameRate)
        ));
        assert!(matches!(
            UserSettings::from_json("not json"),
            Err(SettingsError::ParseError(_))
        ));
    }

    #[test]
    fn test_intensity_serializes_lowercase() {
        let json = serde_json::to_string(&MitigationPolicy::default()).unwrap();
        assert!(json.contains("\"medium\""));
    }
}
