//! Circuit breaker thresholds, per dependency name.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED before the circuit opens.
    pub failure_threshold: u32,

    /// Consecutive HALF_OPEN successes before the circuit closes.
    pub success_threshold: u32,

    /// Cooldown measured from the last recorded failure.
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_ms: 30_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, success_threshold: u32, reset_timeout_ms: u64) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            reset_timeout_ms,
        }
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }
        if self.reset_timeout_ms == 0 {
            return Err("reset_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Default breaker config plus overrides keyed by dependency name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub default_config: CircuitBreakerConfig,
    pub component_configs: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerSettings {
    pub fn config_for(&self, name: &str) -> CircuitBreakerConfig {
        self.component_configs
            .get(name)
            .copied()
            .unwrap_or(self.default_config)
    }

    pub fn with_component(mut self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.component_configs.insert(name.into(), config);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_config
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("circuit_breaker.default_config: {e}")))?;
        for (name, config) in &self.component_configs {
            config.validate().map_err(|e| {
                ConfigError::Invalid(format!("circuit_breaker.component_configs.{name}: {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_values() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.reset_timeout(), Duration::from_secs(30));
    }

    #[rstest]
    #[case(CircuitBreakerConfig::new(0, 2, 1_000), "failure_threshold")]
    #[case(CircuitBreakerConfig::new(3, 0, 1_000), "success_threshold")]
    #[case(CircuitBreakerConfig::new(3, 2, 0), "reset_timeout_ms")]
    fn zero_values_are_rejected(#[case] config: CircuitBreakerConfig, #[case] field: &str) {
        let err = config.validate().unwrap_err();
        assert!(err.contains(field), "{err}");
    }

    #[test]
    fn component_override_wins_over_default() {
        let settings = CircuitBreakerSettings::default()
            .with_component("sendgrid", CircuitBreakerConfig::new(2, 1, 5_000));

        assert_eq!(settings.config_for("sendgrid").failure_threshold, 2);
        assert_eq!(settings.config_for("twilio"), CircuitBreakerConfig::default());
    }

    #[test]
    fn invalid_component_names_the_dependency() {
        let settings = CircuitBreakerSettings::default()
            .with_component("fcm", CircuitBreakerConfig::new(0, 1, 5_000));
        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("fcm"), "{err}");
    }
}
