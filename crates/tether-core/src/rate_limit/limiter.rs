//! RateLimiter - (channel, identifier) ごとのスライディングウィンドウ
//!
//! # フロー
//! 1. チャネルの {window_ms, max_requests} を決める（無ければデフォルト）
//! 2. ストアからタイムスタンプ列を読み、ウィンドウ外を捨てる
//! 3. 上限に達していれば拒否（何も書かない）
//! 4. そうでなければ now を追加し、TTL = 2 × window で保存
//!
//! ストアが使えない場合（書き込みクォータ切れを含む）は、同じキーで
//! プロセス内のウィンドウに切り替える。`check` はエラーを返さない。

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::{ChannelLimit, RateLimitConfig};
use super::memory::MemoryWindows;
use super::window::{self, DecisionSource, RateDecision};
use crate::ports::{Clock, KvStore, KvStoreExt, PutOptions, StoreError};

pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    memory: MemoryWindows,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        let memory = MemoryWindows::new(config.memory_cleanup_threshold);
        Self {
            store,
            clock,
            config,
            memory,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn key(&self, channel: &str, identifier: &str) -> String {
        format!("{}:{}:{}", self.config.key_prefix, channel, identifier)
    }

    pub async fn check(&self, channel: &str, identifier: &str) -> RateDecision {
        let limit = self.config.limit_for(channel);
        let key = self.key(channel, identifier);
        let now_ms = self.clock.now_millis();

        let decision = match self.check_store(&key, limit, now_ms).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(
                    channel,
                    identifier,
                    error = %error,
                    "rate limit store unavailable, using in-memory window"
                );
                self.memory.check(&key, limit, now_ms)
            }
        };

        if !decision.allowed {
            debug!(
                channel,
                identifier,
                retry_after = decision.retry_after,
                "rate limit exceeded"
            );
        }
        decision
    }

    /// Forget the window for one key, in the store and in memory.
    pub async fn reset(&self, channel: &str, identifier: &str) {
        let key = self.key(channel, identifier);
        if let Err(error) = self.store.delete(&key).await {
            warn!(channel, identifier, error = %error, "failed to clear stored rate window");
        }
        self.memory.remove(&key);
    }

    async fn check_store(
        &self,
        key: &str,
        limit: ChannelLimit,
        now_ms: i64,
    ) -> Result<RateDecision, StoreError> {
        let mut timestamps = match self.store.get_json::<Vec<i64>>(key).await {
            Ok(timestamps) => timestamps.unwrap_or_default(),
            Err(StoreError::Malformed { .. }) => Vec::new(),
            Err(error) => return Err(error),
        };

        let decision = window::admit(&mut timestamps, limit, now_ms, DecisionSource::Store);
        if decision.allowed {
            self.store
                .put_json(key, &timestamps, PutOptions::ttl(limit.storage_ttl()))
                .await?;
        }
        Ok(decision)
    }
}
