//! Per-channel sliding-window limits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLimit {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl ChannelLimit {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Store TTL for a window: twice its length, at least one second.
    pub fn storage_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.window_ms.saturating_mul(2).max(1_000))
    }
}

impl Default for ChannelLimit {
    fn default() -> Self {
        Self::new(60_000, 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub key_prefix: String,

    /// Used for any channel without its own entry.
    pub default_limit: ChannelLimit,

    pub channels: HashMap<String, ChannelLimit>,

    /// In-memory fallback sweeps stale windows once it tracks more keys than this.
    pub memory_cleanup_threshold: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            key_prefix: "ratelimit".to_string(),
            default_limit: ChannelLimit::default(),
            channels: HashMap::new(),
            memory_cleanup_threshold: 1_000,
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, channel: &str) -> ChannelLimit {
        self.channels
            .get(channel)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn with_channel(mut self, channel: impl Into<String>, limit: ChannelLimit) -> Self {
        self.channels.insert(channel.into(), limit);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("rate_limit.key_prefix must not be empty".into()));
        }
        let named = self.channels.iter().map(|(name, limit)| (name.as_str(), limit));
        for (name, limit) in std::iter::once(("default", &self.default_limit)).chain(named) {
            if limit.window_ms == 0 || limit.max_requests == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate_limit channel '{name}' needs window_ms > 0 and max_requests > 0"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_channels_use_the_default_limit() {
        let config = RateLimitConfig::default().with_channel("sms", ChannelLimit::new(1_000, 3));
        assert_eq!(config.limit_for("sms"), ChannelLimit::new(1_000, 3));
        assert_eq!(config.limit_for("email"), ChannelLimit::default());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = RateLimitConfig::default().with_channel("sms", ChannelLimit::new(1_000, 0));
        assert!(config.validate().is_err());
        assert!(RateLimitConfig::default().validate().is_ok());
    }

    #[test]
    fn storage_ttl_is_twice_the_window() {
        assert_eq!(
            ChannelLimit::new(30_000, 1).storage_ttl(),
            std::time::Duration::from_secs(60)
        );
        assert_eq!(
            ChannelLimit::new(100, 1).storage_ttl(),
            std::time::Duration::from_secs(1)
        );
    }
}
