//! Configuration validation for Zero services.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{Config, LlmConfig, ObservabilityConfig, ScoringConfig};

/// Upper bound for `llm.max_retries`.
pub const MAX_LLM_RETRIES: u32 = 10;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.llm.validate(),
            self.scoring.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply environment overrides and validate configuration.
    pub fn load_and_validate() -> crate::Result<Self> {
        let config = Self::load_with_env().map_err(|e| crate::Error::Config(format!("{:#}", e)))?;
        config
            .validate()
            .map_err(|e| crate::Error::from(e).with_context("Invalid configuration"))?;
        Ok(config)
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.provider.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.provider".into(),
            });
        }

        if self.api_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.api_url".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_retries > MAX_LLM_RETRIES {
            return Err(ValidationError::InvalidValue {
                field: "llm.max_retries".into(),
                reason: format!("{} exceeds {}", self.max_retries, MAX_LLM_RETRIES),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "llm.temperature".into(),
                reason: format!("{} is outside 0.0-2.0", self.temperature),
            });
        }

        if self.max_backoff_ms < self.backoff_ms {
            return Err(ValidationError::InvalidValue {
                field: "llm.max_backoff_ms".into(),
                reason: "must not be smaller than llm.backoff_ms".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ScoringConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(ValidationError::InvalidValue {
                field: "scoring.tolerance".into(),
                reason: format!("{} is outside [0, 1)", self.tolerance),
            });
        }

        if self.score_fields.is_empty() {
            return Err(ValidationError::MissingField {
                field: "scoring.score_fields".into(),
            });
        }

        if self.rationale_fields.is_empty() {
            return Err(ValidationError::MissingField {
                field: "scoring.rationale_fields".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.llm.timeout_secs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("llm.timeout_secs"));
    }

    #[test]
    fn test_retry_count_bounded() {
        let mut llm = LlmConfig::default();
        llm.max_retries = MAX_LLM_RETRIES;
        assert!(llm.validate().is_ok());

        llm.max_retries = u32::MAX;
        let err = llm.validate().unwrap_err();
        assert!(err.to_string().contains("llm.max_retries"));
    }

    #[test]
    fn test_tolerance_range() {
        let mut scoring = ScoringConfig::default();
        scoring.tolerance = 1.5;
        assert!(scoring.validate().is_err());

        scoring.tolerance = 0.0;
        assert!(scoring.validate().is_ok());
    }

    #[test]
    fn test_empty_alias_lists_rejected() {
        let mut scoring = ScoringConfig::default();
        scoring.rationale_fields.clear();

        assert!(matches!(
            scoring.validate(),
            Err(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_multiple_errors_aggregated() {
        let mut config = Config::default();
        config.llm.api_url = String::new();
        config.observability.log_format = "xml".into();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::Multiple(errors)) if errors.len() == 2
        ));
    }
}
