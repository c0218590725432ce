//! Service configuration file.
//!
//! Every section and field has a documented default. A file is parsed
//! and validated as a whole: any error rejects it, so defaults are never
//! mixed with a partially loaded file.

use crate::capture::CaptureConfig;
use crate::relay::RelayConfig;
use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Frame rate is outside 1-120.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// JPEG quality is outside 1-100.
    #[error("invalid JPEG quality {0} (must be 1-100)")]
    InvalidQuality(u8),
    /// A `[relay]` field is invalid.
    #[error("invalid relay setting: {0}")]
    InvalidRelay(String),
    /// A `[server]` field is invalid.
    #[error("invalid server setting: {0}")]
    InvalidServer(String),
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
///
/// ```toml
/// [camera]
/// device_id = 0
/// quality = 85
///
/// [relay]
/// enabled = true
/// base_url = "https://stream.example.com"
///
/// [server]
/// port = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// `[camera]` section.
    pub camera: CaptureConfig,
    /// `[relay]` section.
    pub relay: RelayConfig,
    /// `[server]` section.
    pub server: ServerConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        self.relay.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.camera.quality, 85);
        assert_eq!(config.server.port, 5000);
        assert!(!config.relay.enabled);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [camera]
            device_id = 1

            [relay]
            enabled = true
            base_url = "https://stream.example.com"
            stream_id = "garage"
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.device_id, 1);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.relay.stream_id, "garage");
        assert_eq!(config.relay.api_path, "/stream_server.php/api/stream");
        assert_eq!(config.relay.timeout_secs, 5);
    }

    #[test]
    fn test_invalid_value_rejects_whole_file() {
        let result = FileConfig::from_toml(
            r#"
            [camera]
            quality = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidQuality(0))));
    }

    #[test]
    fn test_parse_error_rejects_whole_file() {
        let result = FileConfig::from_toml(
            r#"
            [camera]
            device_id = 2
            width = "wide"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(FileConfig::from_toml("[hostinger]\ndomain = \"x\"").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/nonexistent/camera-relay.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
