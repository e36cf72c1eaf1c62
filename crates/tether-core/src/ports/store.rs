//! Store port - 弱整合 KV ストアの抽象化
//!
//! キュー・レートリミッタはこの trait だけを通してストアに触る。
//!
//! # 前提（ストアが保証しないこと）
//! - トランザクション（複数キーの原子的更新）はない
//! - compare-and-swap はない
//! - 別プロセスからの読み取りは結果整合（書いた直後に見えるとは限らない）
//!
//! # 保証すること
//! - get / put / delete / prefix list
//! - put 時の任意 TTL（期限後にキーが消える）

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store write quota exhausted")]
    QuotaExceeded,

    #[error("malformed value at key '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Options for [`KvStore::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Key is evicted by the store after this long. `None` keeps it forever.
    pub ttl: Option<Duration>,
}

impl PutOptions {
    pub fn ttl_secs(secs: u64) -> Self {
        Self {
            ttl: Some(Duration::from_secs(secs)),
        }
    }

    pub fn ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    pub fn persistent() -> Self {
        Self::default()
    }
}

/// KvStore は get / put / delete / list のみを提供する KV ストア
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから共有される）
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Keys (not values) starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// JSON helpers on top of any [`KvStore`].
#[async_trait]
pub trait KvStoreExt: KvStore {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Malformed {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn put_json<T>(&self, key: &str, value: &T, options: PutOptions) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.put(key, raw, options).await
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
