//! InMemoryStore - 開発用・テスト用の KV ストア
//!
//! # 実装詳細
//! - HashMap<String, Entry> を Mutex で保護
//! - TTL は注入された Clock で評価（期限切れのキーは読み取り時に消える）
//! - ロックは await をまたがない（すべての操作は同期的に完結する）

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ports::{Clock, KvStore, PutOptions, StoreError, SystemClock};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// InMemoryStore はプロセス内の KV ストア
///
/// # 使用例
/// ```ignore
/// let clock = Arc::new(FixedClock::new(t0));
/// let store = InMemoryStore::new(clock.clone());
/// store.put("k", "v".into(), PutOptions::ttl_secs(60)).await?;
/// clock.advance_secs(61);
/// assert!(store.get("k").await?.is_none());
/// ```
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Number of unexpired keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<(), StoreError> {
        let now = self.clock.now();
        let expires_at = match options.ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| StoreError::Unavailable(format!("ttl out of range: {e}")))?;
                Some(now + ttl)
            }
            None => None,
        };
        self.entries()?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries()?;
        entries.retain(|_, entry| !entry.is_expired(now));
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, KvStoreExt};
    use chrono::TimeZone;

    fn store() -> (Arc<FixedClock>, InMemoryStore) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let store = InMemoryStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (_, store) = store();
        store.put("a", "1".into(), PutOptions::persistent()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // 存在しないキーの削除はエラーにならない
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn ttl_is_evaluated_against_the_clock() {
        let (clock, store) = store();
        store.put("lease", "x".into(), PutOptions::ttl_secs(30)).await.unwrap();

        clock.advance_secs(29);
        assert!(store.get("lease").await.unwrap().is_some());

        clock.advance_secs(1);
        assert!(store.get("lease").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_prefix_and_expiry() {
        let (clock, store) = store();
        store.put("queue:lease:a", "1".into(), PutOptions::ttl_secs(10)).await.unwrap();
        store.put("queue:lease:b", "1".into(), PutOptions::ttl_secs(100)).await.unwrap();
        store.put("queue:task:a", "1".into(), PutOptions::persistent()).await.unwrap();

        let keys = store.list("queue:lease:").await.unwrap();
        assert_eq!(keys, vec!["queue:lease:a", "queue:lease:b"]);

        clock.advance_secs(10);
        let keys = store.list("queue:lease:").await.unwrap();
        assert_eq!(keys, vec!["queue:lease:b"]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn json_helpers_round_trip_and_report_malformed_values() {
        let (_, store) = store();
        store
            .put_json("ids", &vec!["t1", "t2"], PutOptions::persistent())
            .await
            .unwrap();
        let ids: Option<Vec<String>> = store.get_json("ids").await.unwrap();
        assert_eq!(ids.unwrap(), vec!["t1", "t2"]);

        store.put("bad", "{not json".into(), PutOptions::persistent()).await.unwrap();
        let err = store.get_json::<Vec<String>>("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref key, .. } if key == "bad"));
    }
}
