//! LeaseAcquirer port - CAS を持たないストア上での楽観的な lease 取得
//!
//! claim の「書く → 読み戻す → 自分の nonce か比較する」手順をこの trait の
//! 裏に隠す。ネイティブな CAS やトランザクションを持つストアでは、呼び出し側の
//! 意味を変えずに実装を差し替えられる。

use async_trait::async_trait;

use crate::domain::{Lease, WorkerId};
use crate::ports::StoreError;

/// Outcome of one acquisition attempt on a single lease key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Our nonce is what the store holds now.
    Acquired(Lease),

    /// A live lease from another claim was already there; nothing was written.
    AlreadyHeld(Lease),

    /// We wrote, but the read-back showed someone else's nonce (or nothing).
    RaceLost { winner: Option<WorkerId> },
}

impl Acquisition {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Acquisition::Acquired(_))
    }
}

#[async_trait]
pub trait LeaseAcquirer: Send + Sync {
    /// Try to make `candidate` the lease stored at `key` for `ttl_secs`.
    ///
    /// `candidate.claimed_at` is taken as "now" when judging an existing lease.
    async fn try_acquire(
        &self,
        key: &str,
        candidate: &Lease,
        ttl_secs: u64,
    ) -> Result<Acquisition, StoreError>;
}
