//! Remote endpoint configuration and retry policy.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the remote ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Run the relay while the camera streams.
    pub enabled: bool,
    /// Scheme and host of the remote server, optionally with a path prefix.
    pub base_url: String,
    /// Path frames are POSTed to.
    pub api_path: String,
    /// Path answering connectivity probes.
    pub status_path: String,
    /// Path of the viewer page served by the remote server.
    pub web_app_path: String,
    /// Identifier sent with every frame.
    pub stream_id: String,
    /// Timeout for every outbound request, in seconds.
    pub timeout_secs: u64,
    /// Consecutive failures tolerated at the normal cadence before backing off.
    pub max_retries: u32,
    /// Delay between delivery attempts, in milliseconds.
    pub interval_ms: u64,
    /// Upper bound for the backoff delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://your-domain.example.com".to_string(),
            api_path: "/stream_server.php/api/stream".to_string(),
            status_path: "/stream_server.php/api/status".to_string(),
            web_app_path: "/stream.html".to_string(),
            stream_id: "laptop_camera_001".to_string(),
            timeout_secs: 5,
            max_retries: 3,
            interval_ms: 33,
            max_backoff_ms: 5_000,
        }
    }
}

impl RelayConfig {
    /// Enabled configuration targeting `base_url` with all other defaults.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// URL frames are delivered to.
    pub fn stream_url(&self) -> String {
        self.join(&self.api_path)
    }

    /// URL of the connectivity probe.
    pub fn status_url(&self) -> String {
        self.join(&self.status_path)
    }

    /// URL of the remote viewer page.
    pub fn web_app_url(&self) -> String {
        self.join(&self.web_app_path)
    }

    /// Timeout applied to every request.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay policy derived from the tick and backoff settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_retries: self.max_retries,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    /// Validates the configuration. A disabled relay is always valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidRelay(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.stream_id.is_empty() {
            return Err(ConfigError::InvalidRelay("stream_id is empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidRelay("timeout_secs must be positive".into()));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidRelay("interval_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Pacing of delivery attempts.
///
/// Up to `max_retries` consecutive failures keep the normal cadence.
/// Each failure past that doubles the delay, up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Normal delay between deliveries.
    pub interval: Duration,
    /// Consecutive failures tolerated at the normal delay.
    pub max_retries: u32,
    /// Upper bound for the backoff delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before the next attempt after `consecutive_failures` failures.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        let excess = consecutive_failures.saturating_sub(self.max_retries);
        if excess == 0 {
            return self.interval;
        }
        let factor = 1u32.checked_shl(excess.min(31)).unwrap_or(u32::MAX);
        self.interval
            .saturating_mul(factor)
            .min(self.max_backoff)
            .max(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let config = RelayConfig::for_base_url("https://stream.example.com/");
        assert_eq!(
            config.stream_url(),
            "https://stream.example.com/stream_server.php/api/stream"
        );
        assert_eq!(
            config.status_url(),
            "https://stream.example.com/stream_server.php/api/status"
        );
        assert_eq!(config.web_app_url(), "https://stream.example.com/stream.html");
    }

    #[test]
    fn test_disabled_relay_skips_validation() {
        let config = RelayConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_relay_requires_http_url() {
        let config = RelayConfig::for_base_url("ftp://example.com");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRelay(_))
        ));
    }

    #[test]
    fn test_retry_policy_keeps_cadence_within_retries() {
        let policy = RelayConfig::default().retry_policy();
        assert_eq!(policy.delay_after(0), Duration::from_millis(33));
        assert_eq!(policy.delay_after(3), Duration::from_millis(33));
    }

    #[test]
    fn test_retry_policy_backs_off_and_caps() {
        let policy = RetryPolicy {
            interval: Duration::from_millis(100),
            max_retries: 2,
            max_backoff: Duration::from_millis(1_000),
        };
        assert_eq!(policy.delay_after(3), Duration::from_millis(200));
        assert_eq!(policy.delay_after(4), Duration::from_millis(400));
        assert_eq!(policy.delay_after(6), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_millis(1_000));
    }
}
