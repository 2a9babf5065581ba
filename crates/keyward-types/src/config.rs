//! Runtime configuration for rotation flows.

use serde::{Deserialize, Serialize};

use crate::{KeywardError, Result};

/// Tunable parameters for capture, permits, and submission retries.
///
/// All fields have working defaults; deployments override them through
/// a serialized config file or environment-specific loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Milliseconds between capture polls.
    #[serde(default = "default_capture_poll_ms")]
    pub capture_poll_ms: u64,

    /// Maximum number of capture polls before giving up.
    #[serde(default = "default_capture_max_attempts")]
    pub capture_max_attempts: u32,

    /// Seconds from aggregation time until a permit expires.
    #[serde(default = "default_permit_deadline_secs")]
    pub permit_deadline_secs: u64,

    /// Submission retries after a nonce conflict. Each retry re-fetches
    /// the log and rebuilds the bundle.
    #[serde(default = "default_nonce_retries")]
    pub nonce_retries: u32,
}

fn default_capture_poll_ms() -> u64 {
    300
}

fn default_capture_max_attempts() -> u32 {
    100
}

fn default_permit_deadline_secs() -> u64 {
    3600
}

fn default_nonce_retries() -> u32 {
    1
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            capture_poll_ms: default_capture_poll_ms(),
            capture_max_attempts: default_capture_max_attempts(),
            permit_deadline_secs: default_permit_deadline_secs(),
            nonce_retries: default_nonce_retries(),
        }
    }
}

impl RotationConfig {
    /// Validates that the configuration values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`KeywardError::ConfigError`] if any bound is zero where a
    /// positive value is required.
    pub fn validate(&self) -> Result<()> {
        if self.capture_poll_ms == 0 {
            return Err(KeywardError::ConfigError {
                reason: "capture_poll_ms must be greater than 0".into(),
            });
        }
        if self.capture_max_attempts == 0 {
            return Err(KeywardError::ConfigError {
                reason: "capture_max_attempts must be greater than 0".into(),
            });
        }
        if self.permit_deadline_secs == 0 {
            return Err(KeywardError::ConfigError {
                reason: "permit_deadline_secs must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() -> std::result::Result<(), KeywardError> {
        let config = RotationConfig::default();
        config.validate()?;
        assert_eq!(config.capture_poll_ms, 300);
        assert_eq!(config.capture_max_attempts, 100);
        assert_eq!(config.permit_deadline_secs, 3600);
        assert_eq!(config.nonce_retries, 1);
        Ok(())
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = RotationConfig {
            capture_poll_ms: 0,
            ..RotationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = RotationConfig {
            capture_max_attempts: 0,
            ..RotationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_deadline_rejected() {
        let config = RotationConfig {
            permit_deadline_secs: 0,
            ..RotationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_nonce_retries_allowed() -> std::result::Result<(), KeywardError> {
        let config = RotationConfig {
            nonce_retries: 0,
            ..RotationConfig::default()
        };
        config.validate()?;
        Ok(())
    }

    #[test]
    fn partial_config_fills_defaults() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config: RotationConfig = serde_json::from_str(r#"{"capture_poll_ms": 50}"#)?;
        assert_eq!(config.capture_poll_ms, 50);
        assert_eq!(config.capture_max_attempts, 100);
        Ok(())
    }

    #[test]
    fn config_serde_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config = RotationConfig::default();
        let json = serde_json::to_string(&config)?;
        let parsed: RotationConfig = serde_json::from_str(&json)?;
        assert_eq!(parsed.capture_poll_ms, config.capture_poll_ms);
        assert_eq!(parsed.nonce_retries, config.nonce_retries);
        Ok(())
    }
}
