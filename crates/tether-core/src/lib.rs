//! tether-core
//!
//! Lease-based task queue and resilience primitives built on a weak KV store
//! (get / put / delete / list with per-key TTL, no transactions, no CAS).
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, lease, outcome, state, errors）
//! - **ports**: 抽象化レイヤー（KvStore, Clock, IdGenerator, LeaseAcquirer）
//! - **impls**: 実装（InMemoryStore, WriteVerifyAcquirer, FlakyStore）
//! - **queue**: TaskQueue（claim / release / renew / complete）
//! - **rate_limit**: スライディングウィンドウのレートリミッタ（メモリへのフォールバック付き）
//! - **resilience**: 依存先ごとのサーキットブレーカー
//! - **app**: Hub, HubBuilder, WorkerLoop
//! - **config / error / observability**: 設定、エラー、ログ初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod rate_limit;
pub mod resilience;

pub use app::{Hub, HubBuilder, TaskHandler, WorkerLoop};
pub use config::{ConfigError, TetherConfig};
pub use error::TetherError;
pub use observability::init_tracing;
