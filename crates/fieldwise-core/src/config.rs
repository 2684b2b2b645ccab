use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::extract::TokenUsage;

/// Per-token pricing used by the cost accountant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    /// USD per million input tokens.
    pub input_per_million: f64,
    /// USD per million output tokens.
    pub output_per_million: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

impl CostRates {
    /// Cost in USD for the given usage, rounded to four decimal places.
    #[must_use]
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        let input = (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_million;
        let output = (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_million;
        ((input + output) * 10_000.0).round() / 10_000.0
    }
}

/// Tunable knobs for one extraction pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Fields below this confidence are selected for refinement.
    pub confidence_threshold: f64,
    /// Relative tolerance for cross-field numeric consistency checks.
    pub cross_field_tolerance: f64,
    /// Disable to force single-pass extraction.
    pub enable_refinement: bool,
    /// Timeout applied to each individual model call, not the pipeline.
    pub request_timeout: Duration,
    /// Retries for transient model failures (rate limit, timeout).
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt.
    pub initial_backoff: Duration,
    pub cost_rates: CostRates,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            cross_field_tolerance: 0.05,
            enable_refinement: true,
            request_timeout: Duration::from_secs(120),
            max_retries: 2,
            initial_backoff: Duration::from_secs(2),
            cost_rates: CostRates::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.confidence_threshold));
        }
        if self.cross_field_tolerance < 0.0 {
            return Err(ConfigError::NegativeTolerance(self.cross_field_tolerance));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Confidence threshold {0} outside [0, 1]")]
    ThresholdOutOfRange(f64),
    #[error("Cross-field tolerance must be non-negative, got {0}")]
    NegativeTolerance(f64),
    #[error("Request timeout must be non-zero")]
    ZeroTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ExtractionConfig::default();

        assert!((config.confidence_threshold - 0.70).abs() < f64::EPSILON);
        assert!((config.cross_field_tolerance - 0.05).abs() < f64::EPSILON);
        assert!(config.enable_refinement);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_cost_calculation() {
        let rates = CostRates::default();
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 200_000,
        };

        assert!((rates.cost(&usage) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_rounds_to_four_places() {
        let rates = CostRates::default();
        let usage = TokenUsage {
            input_tokens: 12_345,
            output_tokens: 678,
        };

        let cost = rates.cost(&usage);
        assert!((cost * 10_000.0 - (cost * 10_000.0).round()).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = ExtractionConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ExtractionConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_config_serialization() {
        let config = ExtractionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ExtractionConfig = serde_json::from_str(&json).unwrap();

        assert!((config.confidence_threshold - parsed.confidence_threshold).abs() < f64::EPSILON);
        assert_eq!(config.max_retries, parsed.max_retries);
    }
}
