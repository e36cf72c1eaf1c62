//! Domain identifiers (strongly-typed IDs).
//!
//! タスク ID・ワーカー ID・claim nonce はすべて文字列だが、Phantom type で
//! 型を分けて混同をコンパイル時に防ぐ。
//!
//! ## 文字列ベースの理由
//! - タスク ID は producer が自由に付ける（例: "t1", webhook の message id）
//! - ストアのキーにそのまま埋め込める
//! - 生成が必要な場合は `IdGenerator` が `<prefix><ULID>` を作る

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// 生成時に使うプレフィックス（"task-", "worker-", "nonce-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }

    /// Empty or whitespace-only ids are rejected at the boundary.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Worker のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Worker {}

impl IdMarker for Worker {
    fn prefix() -> &'static str {
        "worker-"
    }
}

/// Claim nonce のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nonce {}

impl IdMarker for Nonce {
    fn prefix() -> &'static str {
        "nonce-"
    }
}

/// Identifier of a queued task (also the suffix of its store keys).
pub type TaskId = Id<Task>;

/// Identifier of a worker process holding leases.
pub type WorkerId = Id<Worker>;

/// Single-use token written with a lease to detect a lost claim race.
pub type ClaimNonce = Id<Nonce>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_their_raw_value() {
        let task = TaskId::new("t1");
        let worker = WorkerId::from("w1");

        assert_eq!(task.to_string(), "t1");
        assert_eq!(worker.as_str(), "w1");

        // let _: TaskId = worker; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let task = TaskId::new("t1");
        let serialized = serde_json::to_string(&task).unwrap();
        assert_eq!(serialized, "\"t1\"");

        let back: TaskId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(TaskId::new("  ").is_blank());
        assert!(!TaskId::new("t1").is_blank());
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<String>());
    }
}
