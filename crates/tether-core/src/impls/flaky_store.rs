//! FlakyStore - 障害注入用のストアラッパー
//!
//! 任意の KvStore を包み、操作の種類ごとに失敗させられる。
//! レートリミッタのフォールバックや、キューがストア障害をそのまま
//! 呼び出し元に返すことの検証に使う。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use crate::ports::{KvStore, PutOptions, StoreError};

pub struct FlakyStore {
    inner: Arc<dyn KvStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    fail_lists: AtomicBool,
    quota_exhausted: AtomicBool,
    failures: AtomicU64,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            quota_exhausted: AtomicBool::new(false),
            failures: AtomicU64::new(0),
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, on: bool) {
        self.fail_lists.store(on, Ordering::SeqCst);
    }

    /// Writes fail with [`StoreError::QuotaExceeded`] instead of `Unavailable`.
    pub fn exhaust_write_quota(&self, on: bool) {
        self.quota_exhausted.store(on, Ordering::SeqCst);
    }

    pub fn fail_everything(&self, on: bool) {
        self.fail_reads(on);
        self.fail_writes(on);
        self.fail_deletes(on);
        self.fail_lists(on);
    }

    /// How many operations were failed on purpose so far.
    pub fn injected_failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check(&self.fail_reads, "get")?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String, options: PutOptions) -> Result<(), StoreError> {
        if self.quota_exhausted.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::QuotaExceeded);
        }
        self.check(&self.fail_writes, "put")?;
        self.inner.put(key, value, options).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(&self.fail_deletes, "delete")?;
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check(&self.fail_lists, "list")?;
        self.inner.list(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStore;

    #[tokio::test]
    async fn passes_through_until_told_to_fail() {
        let store = FlakyStore::new(Arc::new(InMemoryStore::default()));
        store.put("k", "v".into(), PutOptions::persistent()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.fail_writes(true);
        let err = store.put("k", "w".into(), PutOptions::persistent()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.injected_failures(), 1);
    }

    #[tokio::test]
    async fn quota_exhaustion_is_reported_distinctly() {
        let store = FlakyStore::new(Arc::new(InMemoryStore::default()));
        store.exhaust_write_quota(true);
        let err = store.put("k", "v".into(), PutOptions::persistent()).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded));
    }
}
