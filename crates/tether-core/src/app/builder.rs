//! HubBuilder - コンポーネントのワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、不正なら BuildError を返す
//! - ストアは必須。Clock は省略時 SystemClock
//! - acquirer / id generator は差し替え可能（省略時は write-verify と ULID）

use std::sync::Arc;

use super::hub::Hub;
use crate::config::{ConfigError, TetherConfig};
use crate::ports::{Clock, IdGenerator, KvStore, LeaseAcquirer, SystemClock};
use crate::queue::TaskQueue;
use crate::rate_limit::RateLimiter;
use crate::resilience::CircuitBreakerRegistry;

/// HubBuilder は Hub を構築
///
/// # 使用例
/// ```ignore
/// let hub = HubBuilder::new()
///     .store(Arc::new(InMemoryStore::default()))
///     .config(TetherConfig::load(None)?)
///     .build()?;
/// ```
#[derive(Default)]
pub struct HubBuilder {
    store: Option<Arc<dyn KvStore>>,
    clock: Option<Arc<dyn Clock>>,
    acquirer: Option<Arc<dyn LeaseAcquirer>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: TetherConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("a KV store is required")]
    MissingStore,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl HubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the write-then-verify lease acquisition.
    pub fn acquirer(mut self, acquirer: Arc<dyn LeaseAcquirer>) -> Self {
        self.acquirer = Some(acquirer);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: TetherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Hub, BuildError> {
        self.config.validate()?;
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let mut queue = TaskQueue::new(store.clone(), clock.clone(), self.config.queue.clone());
        if let Some(acquirer) = self.acquirer {
            queue = queue.with_acquirer(acquirer);
        }
        if let Some(ids) = self.ids {
            queue = queue.with_id_generator(ids);
        }

        let limiter = RateLimiter::new(store, clock.clone(), self.config.rate_limit.clone());
        let breakers = CircuitBreakerRegistry::new(self.config.circuit_breaker.clone(), clock);

        Ok(Hub::from_parts(
            Arc::new(queue),
            Arc::new(limiter),
            Arc::new(breakers),
            self.config,
        ))
    }
}
