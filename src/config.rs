use crate::error::{CheckoutError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_SUCCESS_REDIRECT_MS: u64 = 2000;
pub const DEFAULT_TIMEOUT_REDIRECT_MS: u64 = 3000;

/// Timing and budget of a payment confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Delay between `Succeeded` and the navigation signal.
    pub success_redirect_delay: Duration,
    /// Delay between `TimedOut` and the navigation signal.
    pub timeout_redirect_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            success_redirect_delay: Duration::from_millis(DEFAULT_SUCCESS_REDIRECT_MS),
            timeout_redirect_delay: Duration::from_millis(DEFAULT_TIMEOUT_REDIRECT_MS),
        }
    }
}

/// On-disk form of [`PollerConfig`]; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfigFile {
    pub max_attempts: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub success_redirect_ms: Option<u64>,
    pub timeout_redirect_ms: Option<u64>,
}

impl PollerConfig {
    /// Loads a JSON config file, falling back to defaults for missing keys.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: PollerConfigFile = serde_json::from_str(&raw)
            .map_err(|e| CheckoutError::ConfigError(e.to_string()))?;
        Self::default().merge(file)
    }

    /// Overlays the keys present in `file` onto `self`.
    pub fn merge(self, file: PollerConfigFile) -> Result<Self> {
        let config = Self {
            max_attempts: file.max_attempts.unwrap_or(self.max_attempts),
            poll_interval: file
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(self.poll_interval),
            success_redirect_delay: file
                .success_redirect_ms
                .map(Duration::from_millis)
                .unwrap_or(self.success_redirect_delay),
            timeout_redirect_delay: file
                .timeout_redirect_ms
                .map(Duration::from_millis)
                .unwrap_or(self.timeout_redirect_delay),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CheckoutError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings of the remote commerce API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_checkout_timings() {
        let config = PollerConfig::default();
        assert_eq!(config.max_attempts, 30);
        assert_eq!(config.poll_interval, Duration::from_millis(2000));
        assert_eq!(config.success_redirect_delay, Duration::from_millis(2000));
        assert_eq!(config.timeout_redirect_delay, Duration::from_millis(3000));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"max_attempts": 5, "poll_interval_ms": 100}}"#).unwrap();

        let config = PollerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.timeout_redirect_delay, Duration::from_millis(3000));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let file = PollerConfigFile {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            PollerConfig::default().merge(file),
            Err(CheckoutError::ConfigError(_))
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"max_attempt": 5}}"#).unwrap();
        assert!(PollerConfig::from_file(file.path()).is_err());
    }
}
