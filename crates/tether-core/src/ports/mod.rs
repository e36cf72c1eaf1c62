//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! コアのロジック（queue / rate_limit / resilience）はここに定義された trait
//! だけに依存し、具体的なストアや時計は impls 側で差し込みます。

pub mod acquirer;
pub mod clock;
pub mod id_generator;
pub mod store;

// 主要な trait を再エクスポート
pub use self::acquirer::{Acquisition, LeaseAcquirer};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::store::{KvStore, KvStoreExt, PutOptions, StoreError};
