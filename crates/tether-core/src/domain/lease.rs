//! Lease - タスクに対する時間制限付きの単一保持者 claim
//!
//! # 設計原則
//! - lease は `expires_at` を明示的に持ち、注入された Clock と比較して判定する
//! - ストアの TTL は掃除のためのもので、生存判定の根拠にはしない
//! - 期限切れの lease は「存在しない」と同じ扱い

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ClaimNonce, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub worker_id: WorkerId,
    pub claim_nonce: ClaimNonce,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(
        worker_id: WorkerId,
        claim_nonce: ClaimNonce,
        now: DateTime<Utc>,
        duration_secs: u64,
    ) -> Self {
        Self {
            worker_id,
            claim_nonce,
            claimed_at: now,
            expires_at: now + Duration::seconds(duration_secs as i64),
        }
    }

    /// Live strictly before `expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_held_by(&self, worker_id: &WorkerId) -> bool {
        &self.worker_id == worker_id
    }

    /// Same holder and nonce, new expiry. Used by renew.
    pub fn extended(&self, now: DateTime<Utc>, extend_secs: u64) -> Self {
        Self {
            expires_at: now + Duration::seconds(extend_secs as i64),
            ..self.clone()
        }
    }

    /// Seconds until expiry, zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}
