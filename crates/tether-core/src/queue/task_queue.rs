//! TaskQueue - KV ストア上の lease ベースのタスクキュー
//!
//! # プロトコル
//! - claim: pending を先頭から走査し、生きている lease の無い最初のタスクに
//!   nonce 付き lease を書いて読み戻す。自分の nonce が見えた場合のみ勝ち
//!   （期限切れの lease はストアに残っていても無いものとして扱う）
//! - release / renew: 保持者チェック付きで lease を削除・延長
//! - complete: 結果を保存し、pending から外し、タスク本体と lease を消す
//!
//! # 設計原則
//! - 同時に生きている lease はタスクごとに高々 1 つ（プロトコルで保証）
//! - ワーカーが死んだ場合は lease の期限切れだけで回収される
//! - ストア障害はそのまま呼び出し元に返す（内部リトライなし）

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::config::QueueConfig;
use super::keys::QueueKeys;
use crate::domain::{Lease, QueueError, Task, TaskId, TaskResult, TaskStatus, WorkerId};
use crate::impls::WriteVerifyAcquirer;
use crate::observability::QueueCounts;
use crate::ports::{
    Acquisition, Clock, IdGenerator, KvStore, KvStoreExt, LeaseAcquirer, PutOptions,
    StoreError, UlidGenerator,
};

/// What a claim call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed { task: Task, lease: Lease },
    /// Nothing claimable; `pending` is the pending-list length seen by the scan.
    Empty { pending: usize },
}

impl ClaimOutcome {
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            ClaimOutcome::Claimed { task, .. } => Some(&task.id),
            ClaimOutcome::Empty { .. } => None,
        }
    }
}

pub struct TaskQueue {
    store: Arc<dyn KvStore>,
    acquirer: Arc<dyn LeaseAcquirer>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    keys: QueueKeys,
    config: QueueConfig,
}

impl TaskQueue {
    /// Queue with the write-then-verify acquirer and ULID ids.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: QueueConfig) -> Self {
        let acquirer = WriteVerifyAcquirer::new(store.clone())
            .with_verify_delay(Duration::from_millis(config.verify_delay_ms));
        Self {
            acquirer: Arc::new(acquirer),
            ids: Arc::new(UlidGenerator::new(clock.clone())),
            keys: QueueKeys::new(config.key_prefix.clone()),
            store,
            clock,
            config,
        }
    }

    /// Swap the optimistic acquirer, e.g. for a store with native CAS.
    pub fn with_acquirer(mut self, acquirer: Arc<dyn LeaseAcquirer>) -> Self {
        self.acquirer = acquirer;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    /// Producer side: store the body and append the id to the pending list once.
    pub async fn enqueue(
        &self,
        task_id: Option<TaskId>,
        payload: serde_json::Value,
    ) -> Result<Task, QueueError> {
        let task_id = task_id.unwrap_or_else(|| self.ids.generate_task_id());
        ensure_task_id(&task_id)?;

        let task = Task::new(task_id.clone(), payload, self.clock.now());
        self.store
            .put_json(&self.keys.task(&task_id), &task, PutOptions::persistent())
            .await?;
        // 新しい生存期間の開始：古い結果は残さない
        self.store.delete(&self.keys.result(&task_id)).await?;

        let mut pending = self.pending_ids().await?;
        if !pending.contains(&task_id) {
            pending.push(task_id.clone());
            self.store
                .put_json(&self.keys.pending(), &pending, PutOptions::persistent())
                .await?;
        }

        info!(task_id = %task_id, pending = pending.len(), "task enqueued");
        Ok(task)
    }

    /// Hand the first unleased pending task to `worker_id`.
    ///
    /// A missing worker id is replaced by a generated one.
    pub async fn claim(
        &self,
        worker_id: Option<WorkerId>,
        lease_secs: Option<u64>,
    ) -> Result<ClaimOutcome, QueueError> {
        let worker_id = worker_id.unwrap_or_else(|| self.ids.generate_worker_id());
        ensure_worker_id(&worker_id)?;
        let lease_secs = self.config.clamp_lease(lease_secs);

        let pending = self.pending_ids().await?;
        if pending.is_empty() {
            return Ok(ClaimOutcome::Empty { pending: 0 });
        }

        // lease キーの一覧は 1 回だけ取る。一覧に無いタスクはそのまま acquirer に渡す
        let listed: HashSet<String> = self
            .store
            .list(&self.keys.lease_prefix())
            .await?
            .into_iter()
            .collect();

        for task_id in &pending {
            let lease_key = self.keys.lease(task_id);
            // 期限切れの lease を遅れて消すストアもある。一覧に載っていても判定は時計で行う
            if listed.contains(&lease_key)
                && let Some(holder) = self.live_lease(&lease_key).await?
            {
                debug!(task_id = %task_id, holder = %holder.worker_id, "task already leased");
                continue;
            }

            let candidate = Lease::new(
                worker_id.clone(),
                self.ids.generate_claim_nonce(),
                self.clock.now(),
                lease_secs,
            );

            let lease = match self
                .acquirer
                .try_acquire(&lease_key, &candidate, lease_secs)
                .await?
            {
                Acquisition::Acquired(lease) => lease,
                Acquisition::AlreadyHeld(existing) => {
                    debug!(
                        task_id = %task_id,
                        holder = %existing.worker_id,
                        "skipping task leased after listing"
                    );
                    continue;
                }
                Acquisition::RaceLost { winner } => {
                    debug!(
                        task_id = %task_id,
                        worker_id = %worker_id,
                        winner = ?winner.as_ref().map(|w| w.as_str()),
                        "claim race lost"
                    );
                    continue;
                }
            };

            let body = match self.store.get_json::<Task>(&self.keys.task(task_id)).await {
                Ok(body) => body,
                Err(err) => {
                    // 本体が読めないなら lease を持ったまま返さない
                    warn!(task_id = %task_id, error = %err, "task body unreadable, dropping lease");
                    if let Err(cleanup) = self.store.delete(&lease_key).await {
                        warn!(task_id = %task_id, error = %cleanup, "failed to drop lease");
                    }
                    return Err(err.into());
                }
            };
            match body {
                Some(task) => {
                    info!(
                        task_id = %task_id,
                        worker_id = %worker_id,
                        lease_secs,
                        "task claimed"
                    );
                    return Ok(ClaimOutcome::Claimed { task, lease });
                }
                None => {
                    // 並行して削除されたタスク。取ったばかりの lease を返して次へ
                    warn!(task_id = %task_id, "pending entry has no task body, skipping");
                    self.store.delete(&lease_key).await?;
                }
            }
        }

        debug!(worker_id = %worker_id, pending = pending.len(), "no tasks available");
        Ok(ClaimOutcome::Empty {
            pending: pending.len(),
        })
    }

    /// Drop the lease. With `worker_id` the caller must be the holder; without
    /// it anyone may release (administrative cleanup). No live lease is success.
    pub async fn release(
        &self,
        task_id: &TaskId,
        worker_id: Option<&WorkerId>,
        reason: Option<&str>,
    ) -> Result<(), QueueError> {
        ensure_task_id(task_id)?;
        if let Some(worker_id) = worker_id {
            ensure_worker_id(worker_id)?;
        }
        let lease_key = self.keys.lease(task_id);
        let now = self.clock.now();

        let Some(lease) = self.store.get_json::<Lease>(&lease_key).await? else {
            debug!(task_id = %task_id, "release without lease");
            return Ok(());
        };

        if lease.is_live(now)
            && let Some(worker_id) = worker_id
            && !lease.is_held_by(worker_id)
        {
            return Err(QueueError::LeaseConflict {
                task_id: task_id.clone(),
                worker_id: worker_id.clone(),
            });
        }

        self.store.delete(&lease_key).await?;
        info!(
            task_id = %task_id,
            holder = %lease.worker_id,
            reason = reason.unwrap_or("unspecified"),
            "lease released"
        );
        Ok(())
    }

    /// Keep-alive: holder pushes `expires_at` to `now + extend_secs`.
    pub async fn renew(
        &self,
        task_id: &TaskId,
        worker_id: &WorkerId,
        extend_secs: Option<u64>,
    ) -> Result<Lease, QueueError> {
        ensure_task_id(task_id)?;
        ensure_worker_id(worker_id)?;
        let lease_key = self.keys.lease(task_id);
        let now = self.clock.now();
        let extend_secs = self.config.clamp_lease(extend_secs);

        let lease = match self.store.get_json::<Lease>(&lease_key).await? {
            Some(lease) if lease.is_live(now) => lease,
            _ => return Err(QueueError::InvalidLease(task_id.clone())),
        };
        if !lease.is_held_by(worker_id) {
            return Err(QueueError::LeaseConflict {
                task_id: task_id.clone(),
                worker_id: worker_id.clone(),
            });
        }

        let renewed = lease.extended(now, extend_secs);
        self.store
            .put_json(&lease_key, &renewed, PutOptions::ttl_secs(extend_secs))
            .await?;
        debug!(task_id = %task_id, worker_id = %worker_id, extend_secs, "lease renewed");
        Ok(renewed)
    }

    /// Rewrite the body's status; the lease is untouched.
    pub async fn update_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, QueueError> {
        ensure_task_id(task_id)?;
        let task_key = self.keys.task(task_id);
        let mut task = self
            .store
            .get_json::<Task>(&task_key)
            .await?
            .ok_or_else(|| QueueError::TaskNotFound(task_id.clone()))?;

        task.set_status(status, self.clock.now());
        self.store
            .put_json(&task_key, &task, PutOptions::persistent())
            .await?;
        debug!(task_id = %task_id, status = %status, "task status updated");
        Ok(task)
    }

    /// Write the result, then remove the task from the queue.
    pub async fn complete(&self, task_id: &TaskId, result: TaskResult) -> Result<(), QueueError> {
        ensure_task_id(task_id)?;
        self.store
            .put_json(
                &self.keys.result(task_id),
                &result,
                PutOptions::ttl_secs(self.config.result_ttl_secs),
            )
            .await?;

        // 非原子的な read-modify-write。pending はスケジューリング用の目安で、
        // claim の排他性はここに依存しない
        let pending = self.pending_ids().await?;
        let remaining: Vec<TaskId> = pending.iter().filter(|id| *id != task_id).cloned().collect();
        if remaining.len() != pending.len() {
            self.store
                .put_json(&self.keys.pending(), &remaining, PutOptions::persistent())
                .await?;
        }

        self.store.delete(&self.keys.task(task_id)).await?;
        self.store.delete(&self.keys.lease(task_id)).await?;

        info!(task_id = %task_id, success = result.success, "task completed");
        Ok(())
    }

    pub async fn get_result(&self, task_id: &TaskId) -> Result<TaskResult, QueueError> {
        ensure_task_id(task_id)?;
        self.store
            .get_json::<TaskResult>(&self.keys.result(task_id))
            .await?
            .ok_or_else(|| QueueError::ResultNotFound(task_id.clone()))
    }

    pub async fn get_task(&self, task_id: &TaskId) -> Result<Task, QueueError> {
        ensure_task_id(task_id)?;
        self.store
            .get_json::<Task>(&self.keys.task(task_id))
            .await?
            .ok_or_else(|| QueueError::TaskNotFound(task_id.clone()))
    }

    /// Live lease for `task_id`, if any.
    pub async fn get_lease(&self, task_id: &TaskId) -> Result<Option<Lease>, QueueError> {
        ensure_task_id(task_id)?;
        let now = self.clock.now();
        Ok(self
            .store
            .get_json::<Lease>(&self.keys.lease(task_id))
            .await?
            .filter(|lease| lease.is_live(now)))
    }

    pub async fn pending_ids(&self) -> Result<Vec<TaskId>, QueueError> {
        Ok(self
            .store
            .get_json::<Vec<TaskId>>(&self.keys.pending())
            .await?
            .unwrap_or_default())
    }

    /// `leased` counts only leases still live by the clock.
    pub async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let pending = self.pending_ids().await?.len();
        let mut leased = 0;
        for key in self.store.list(&self.keys.lease_prefix()).await? {
            if self.live_lease(&key).await?.is_some() {
                leased += 1;
            }
        }
        Ok(QueueCounts { pending, leased })
    }

    /// Lease at `lease_key` if live now. A malformed record counts as absent;
    /// the acquirer overwrites it on the next claim.
    async fn live_lease(&self, lease_key: &str) -> Result<Option<Lease>, QueueError> {
        let now = self.clock.now();
        match self.store.get_json::<Lease>(lease_key).await {
            Ok(lease) => Ok(lease.filter(|lease| lease.is_live(now))),
            Err(StoreError::Malformed { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn ensure_task_id(task_id: &TaskId) -> Result<(), QueueError> {
    if task_id.is_blank() {
        return Err(QueueError::Validation("task id must not be empty".into()));
    }
    Ok(())
}

fn ensure_worker_id(worker_id: &WorkerId) -> Result<(), QueueError> {
    if worker_id.is_blank() {
        return Err(QueueError::Validation("worker id must not be empty".into()));
    }
    Ok(())
}
