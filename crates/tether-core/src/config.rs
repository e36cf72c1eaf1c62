//! Configuration - TOML ファイル + 環境変数
//!
//! # 優先順位
//! 1. 環境変数（`TETHER_LOG_LEVEL`）
//! 2. TOML ファイル（`load` に渡したパス、無ければ `TETHER_CONFIG`）
//! 3. 各構造体のデフォルト
//!
//! すべてのセクションは省略可能。読み込み後に `validate` で検証する。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::QueueConfig;
use crate::rate_limit::RateLimitConfig;
use crate::resilience::CircuitBreakerSettings;

pub const CONFIG_PATH_ENV: &str = "TETHER_CONFIG";
pub const LOG_LEVEL_ENV: &str = "TETHER_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_level: String,
    pub queue: QueueConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            queue: QueueConfig::default(),
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

impl TetherConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// File (explicit path, else `TETHER_CONFIG`, else defaults), then env
    /// overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(LOG_LEVEL_ENV)
            && !level.trim().is_empty()
        {
            self.log_level = level.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level must not be empty".into()));
        }
        self.queue.validate()?;
        self.rate_limit.validate()?;
        self.circuit_breaker.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = TetherConfig::from_toml_str("").unwrap();
        assert_eq!(config, TetherConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn sections_override_selectively() {
        let raw = r#"
            log_level = "debug"

            [queue]
            default_lease_secs = 120

            [rate_limit.channels.sms]
            window_ms = 1000
            max_requests = 3

            [circuit_breaker.default_config]
            failure_threshold = 2

            [circuit_breaker.component_configs.twilio]
            failure_threshold = 1
            success_threshold = 1
            reset_timeout_ms = 500
        "#;
        let config = TetherConfig::from_toml_str(raw).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.queue.default_lease_secs, 120);
        assert_eq!(config.queue.max_lease_secs, 600);
        assert_eq!(config.rate_limit.limit_for("sms").max_requests, 3);
        assert_eq!(config.rate_limit.limit_for("email").max_requests, 60);
        assert_eq!(config.circuit_breaker.default_config.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.default_config.success_threshold, 2);
        assert_eq!(config.circuit_breaker.config_for("twilio").reset_timeout_ms, 500);
        config.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = TetherConfig::from_toml_str("[queue\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_reaches_every_section() {
        let config = TetherConfig::from_toml_str("[queue]\ndefault_lease_secs = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config =
            TetherConfig::from_toml_str("[circuit_breaker.default_config]\nreset_timeout_ms = 0")
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_override_replaces_log_level() {
        let mut config = TetherConfig::default();
        config.apply_env_overrides(|key| (key == LOG_LEVEL_ENV).then(|| "warn".to_string()));
        assert_eq!(config.log_level, "warn");

        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = TetherConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
