//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::pipeline::retry::RetryPolicy;
use crate::types::Variant;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_upload_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_upload_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        for variant in Variant::ALL {
            let spec = self.renditions.get(variant);
            if spec.max_dimension == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "renditions.{variant}.max_dimension must be > 0"
                )));
            }
            if spec.quality == 0 || spec.quality > 100 {
                return Err(ConfigError::ValidationError(format!(
                    "renditions.{variant}.quality must be between 1 and 100"
                )));
            }
        }
        validate_policy("retry.storage", &self.retry.storage)?;
        validate_policy("retry.geocode", &self.retry.geocode)?;
        if self.geocode.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "geocode.timeout_ms must be > 0".into(),
            ));
        }
        if self.geocode.queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "geocode.queue_size must be > 0".into(),
            ));
        }
        if self.logging.format != "pretty" && self.logging.format != "json" {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}

fn validate_policy(section: &str, policy: &RetryPolicy) -> Result<(), ConfigError> {
    if policy.max_attempts == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{section}.max_attempts must be > 0"
        )));
    }
    if policy.base_delay_ms > policy.max_delay_ms {
        return Err(ConfigError::ValidationError(format!(
            "{section}.base_delay_ms must not exceed {section}.max_delay_ms"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_upload_limit() {
        let mut config = Config::default();
        config.limits.max_upload_mb = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_upload_mb"));
    }

    #[test]
    fn test_validate_rejects_quality_out_of_range() {
        let mut config = Config::default();
        config.renditions.detail.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("renditions.detail.quality"));
    }

    #[test]
    fn test_validate_rejects_zero_rendition_size() {
        let mut config = Config::default();
        config.renditions.thumb.max_dimension = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("renditions.thumb.max_dimension"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.geocode.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry.geocode.max_attempts"));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = Config::default();
        config.retry.storage.base_delay_ms = 5000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry.storage.base_delay_ms"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
