//! WriteVerifyAcquirer - CAS なしの lease 取得（書き込み → 読み戻し → nonce 比較）
//!
//! # 手順
//! 1. 既存の lease を読む。他人の生きている lease があれば書かずに AlreadyHeld
//! 2. 自分の nonce を含む lease を TTL 付きで書く
//! 3. verify_delay だけ待ち、同じキーを読み戻す。nonce が違えば RaceLost
//! 4. もう一度 verify_delay だけ待って再確認し、まだ自分の nonce なら Acquired
//!
//! 競合した書き込みは最後の書き手が残る。負けた側は読み戻しで必ず不一致を見る。
//! 再確認により、遅れて着地した書き込みも最大 2 × verify_delay までは検出できる。
//! それより遅い書き込みは検出できない。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::Lease;
use crate::ports::{Acquisition, KvStore, KvStoreExt, LeaseAcquirer, PutOptions, StoreError};

/// Pause before each read-back unless overridden.
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(50);

pub struct WriteVerifyAcquirer {
    store: Arc<dyn KvStore>,
    verify_delay: Duration,
}

impl WriteVerifyAcquirer {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            verify_delay: DEFAULT_VERIFY_DELAY,
        }
    }

    /// Wait this long before each of the two read-backs, giving concurrent
    /// writers on an eventually-consistent store time to land.
    pub fn with_verify_delay(mut self, verify_delay: Duration) -> Self {
        self.verify_delay = verify_delay;
        self
    }

    async fn read_existing(&self, key: &str) -> Result<Option<Lease>, StoreError> {
        match self.store.get_json::<Lease>(key).await {
            Ok(lease) => Ok(lease),
            Err(StoreError::Malformed { key, source }) => {
                // 壊れた lease は上書きして回復する
                warn!(key = %key, error = %source, "discarding malformed lease record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn read_back(&self, key: &str) -> Result<Option<Lease>, StoreError> {
        if !self.verify_delay.is_zero() {
            tokio::time::sleep(self.verify_delay).await;
        }
        self.read_existing(key).await
    }

    fn lost(&self, key: &str, candidate: &Lease, seen: Option<Lease>) -> Acquisition {
        let winner = seen.map(|lease| lease.worker_id);
        debug!(
            key = %key,
            worker_id = %candidate.worker_id,
            winner = ?winner.as_ref().map(|w| w.as_str()),
            "lease write lost the race"
        );
        Acquisition::RaceLost { winner }
    }
}

#[async_trait]
impl LeaseAcquirer for WriteVerifyAcquirer {
    async fn try_acquire(
        &self,
        key: &str,
        candidate: &Lease,
        ttl_secs: u64,
    ) -> Result<Acquisition, StoreError> {
        let now = candidate.claimed_at;

        if let Some(existing) = self.read_existing(key).await?
            && existing.is_live(now)
            && existing.claim_nonce != candidate.claim_nonce
        {
            return Ok(Acquisition::AlreadyHeld(existing));
        }

        self.store
            .put_json(key, candidate, PutOptions::ttl_secs(ttl_secs))
            .await?;

        let first = self.read_back(key).await?;
        if !holds(&first, candidate) {
            return Ok(self.lost(key, candidate, first));
        }

        // 遅れて着地した書き込みを拾うための再確認
        let confirmed = self.read_back(key).await?;
        match confirmed {
            Some(lease) if lease.claim_nonce == candidate.claim_nonce => {
                Ok(Acquisition::Acquired(lease))
            }
            other => Ok(self.lost(key, candidate, other)),
        }
    }
}

fn holds(seen: &Option<Lease>, candidate: &Lease) -> bool {
    seen.as_ref()
        .is_some_and(|lease| lease.claim_nonce == candidate.claim_nonce)
}
