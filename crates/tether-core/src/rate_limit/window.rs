//! Sliding-window admission shared by the store path and the in-memory path.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::ChannelLimit;

/// Which path produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Store,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Whole seconds until a slot frees up; only set on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip)]
    pub source: DecisionSource,
}

/// Drop timestamps at or before `now - window`.
pub(crate) fn prune(timestamps: &mut Vec<i64>, limit: ChannelLimit, now_ms: i64) {
    let cutoff = now_ms - limit.window_ms as i64;
    timestamps.retain(|&ts| ts > cutoff);
}

/// Decide one request against `timestamps`, recording `now_ms` only if allowed.
pub(crate) fn admit(
    timestamps: &mut Vec<i64>,
    limit: ChannelLimit,
    now_ms: i64,
    source: DecisionSource,
) -> RateDecision {
    prune(timestamps, limit, now_ms);
    let window_ms = limit.window_ms as i64;
    let max = limit.max_requests as usize;

    if timestamps.len() >= max {
        let oldest = timestamps.iter().copied().min().unwrap_or(now_ms);
        let reset_ms = oldest + window_ms;
        let wait_ms = (reset_ms - now_ms).max(1) as u64;
        return RateDecision {
            allowed: false,
            remaining: 0,
            reset_at: millis_to_datetime(reset_ms),
            retry_after: Some(wait_ms.div_ceil(1_000)),
            source,
        };
    }

    timestamps.push(now_ms);
    let oldest = timestamps.iter().copied().min().unwrap_or(now_ms);
    RateDecision {
        allowed: true,
        remaining: (max - timestamps.len()) as u32,
        reset_at: millis_to_datetime(oldest + window_ms),
        retry_after: None,
        source,
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
