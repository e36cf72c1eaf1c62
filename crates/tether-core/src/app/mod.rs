//! App - アプリケーション層
//!
//! ports と各コンポーネントを組み合わせて、呼び出し側の表面を提供します。
//!
//! # 主要コンポーネント
//! - **HubBuilder**: ストア・Clock・設定のワイヤリングと起動時検証
//! - **Hub**: claim / release / renew / status / complete / result、レート制限、ブレーカー
//! - **WorkerLoop**: claim → handle → complete のワーカー側ループ（ハートビート付き）

pub mod builder;
pub mod hub;
pub mod responses;
pub mod worker_loop;

pub use self::builder::{BuildError, HubBuilder};
pub use self::hub::Hub;
pub use self::responses::{
    Ack, ClaimResponse, ClaimedTask, EnqueueResponse, NoTaskAvailable, RenewResponse,
    StatusResponse,
};
pub use self::worker_loop::{HandlerError, Step, TaskHandler, WorkerGroup, WorkerLoop, WorkerReport};
