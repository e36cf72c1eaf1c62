//! Queue policy: lease bounds, result retention, key prefix.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Hard ceiling on any lease or renewal, bounding worst-case reclaim latency.
pub const MAX_LEASE_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Prefix of every queue key (`{prefix}:pending`, `{prefix}:lease:{id}`, ...).
    pub key_prefix: String,

    /// Lease length when the caller does not ask for one.
    pub default_lease_secs: u64,

    /// Upper clamp for claim and renew. Never above [`MAX_LEASE_SECS`].
    pub max_lease_secs: u64,

    /// How long a completed task's result stays readable.
    pub result_ttl_secs: u64,

    /// Pause before each of the two lease read-backs during claim.
    pub verify_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key_prefix: "queue".to_string(),
            default_lease_secs: 300,
            max_lease_secs: MAX_LEASE_SECS,
            result_ttl_secs: 86_400,
            verify_delay_ms: 50,
        }
    }
}

impl QueueConfig {
    /// Requested seconds (or the default), clamped into `[1, max_lease_secs]`.
    pub fn clamp_lease(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_lease_secs)
            .clamp(1, self.max_lease_secs.clamp(1, MAX_LEASE_SECS))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("queue.key_prefix must not be empty".into()));
        }
        if self.max_lease_secs == 0 || self.max_lease_secs > MAX_LEASE_SECS {
            return Err(ConfigError::Invalid(format!(
                "queue.max_lease_secs must be within 1..={MAX_LEASE_SECS}"
            )));
        }
        if self.default_lease_secs == 0 || self.default_lease_secs > self.max_lease_secs {
            return Err(ConfigError::Invalid(
                "queue.default_lease_secs must be within 1..=max_lease_secs".into(),
            ));
        }
        if self.result_ttl_secs == 0 {
            return Err(ConfigError::Invalid("queue.result_ttl_secs must be greater than 0".into()));
        }
        Ok(())
    }
}
