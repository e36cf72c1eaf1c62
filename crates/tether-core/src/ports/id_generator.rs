//! IdGenerator port - ID と claim nonce の生成
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）
//!
//! claim nonce は「書いた lease が自分のものか」を読み戻しで判定するための
//! 使い捨てトークン。衝突しないことだけが要件なので ULID の 80bit 乱数部で十分。

use ulid::Ulid;

use crate::domain::ids::{ClaimNonce, IdMarker, Nonce, Task, TaskId, Worker, WorkerId};
use crate::ports::Clock;

/// IdGenerator は分散環境で衝突しない ID を生成
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    fn generate_worker_id(&self) -> WorkerId;

    fn generate_claim_nonce(&self) -> ClaimNonce;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使っても、乱数部があるので ID は一意。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next<M: IdMarker>(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        format!("{}{}", M::prefix(), ulid)
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        TaskId::new(self.next::<Task>())
    }

    fn generate_worker_id(&self) -> WorkerId {
        WorkerId::new(self.next::<Worker>())
    }

    fn generate_claim_nonce(&self) -> ClaimNonce {
        ClaimNonce::new(self.next::<Nonce>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn nonces_are_unique() {
        let id_gen = UlidGenerator::new(SystemClock);

        let n1 = id_gen.generate_claim_nonce();
        let n2 = id_gen.generate_claim_nonce();
        let n3 = id_gen.generate_claim_nonce();

        assert_ne!(n1, n2);
        assert_ne!(n2, n3);
        assert_ne!(n1, n3);
    }

    #[test]
    fn fixed_clock_still_yields_distinct_ids() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_task_id();
        let id2 = id_gen.generate_task_id();
        assert_ne!(id1, id2);

        // timestamp 部分は同じはず
        let ulid1: Ulid = id1.as_str().trim_start_matches("task-").parse().unwrap();
        assert_eq!(ulid1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn generated_ids_carry_their_prefix() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_task_id().as_str().starts_with("task-"));
        assert!(id_gen.generate_worker_id().as_str().starts_with("worker-"));
        assert!(id_gen.generate_claim_nonce().as_str().starts_with("nonce-"));
    }
}
