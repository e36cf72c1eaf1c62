//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryStore**: Clock 駆動の TTL を持つ KV ストア
//! - **WriteVerifyAcquirer**: CAS なしストア向けの lease 取得
//! - **FlakyStore**: 障害注入ラッパー
//!
//! 本番のストア（Workers KV など）のアダプタは別クレートに置く想定。

pub mod flaky_store;
pub mod memory_store;
pub mod write_verify;

pub use self::flaky_store::FlakyStore;
pub use self::memory_store::InMemoryStore;
pub use self::write_verify::WriteVerifyAcquirer;
