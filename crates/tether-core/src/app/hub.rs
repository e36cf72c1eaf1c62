//! Hub - 呼び出し側に見せる表面
//!
//! キュー・レートリミッタ・サーキットブレーカーを 1 つにまとめる。
//! 入力は文字列で受け取り、ドメイン型への変換と検証はここで行う。
//! 応答はすべて serde でシリアライズ可能（`responses` を参照）。

use std::future::Future;
use std::sync::Arc;

use crate::config::TetherConfig;
use crate::domain::{Task, TaskId, TaskResult, TaskStatus, WorkerId};
use crate::error::TetherError;
use crate::observability::QueueCounts;
use crate::queue::TaskQueue;
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::resilience::{CircuitBreakerError, CircuitBreakerRegistry, CircuitStats};

use super::responses::{Ack, ClaimResponse, EnqueueResponse, RenewResponse, StatusResponse};

/// Cheap to clone; all components are shared.
#[derive(Clone)]
pub struct Hub {
    queue: Arc<TaskQueue>,
    limiter: Arc<RateLimiter>,
    breakers: Arc<CircuitBreakerRegistry>,
    config: Arc<TetherConfig>,
}

impl Hub {
    pub(crate) fn from_parts(
        queue: Arc<TaskQueue>,
        limiter: Arc<RateLimiter>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: TetherConfig,
    ) -> Self {
        Self {
            queue,
            limiter,
            breakers,
            config: Arc::new(config),
        }
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn config(&self) -> &TetherConfig {
        &self.config
    }

    pub async fn enqueue(
        &self,
        task_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<EnqueueResponse, TetherError> {
        let task = self.queue.enqueue(task_id.map(TaskId::from), payload).await?;
        Ok(EnqueueResponse {
            success: true,
            task_id: task.id,
        })
    }

    pub async fn claim(
        &self,
        worker_id: Option<&str>,
        lease_secs: Option<u64>,
    ) -> Result<ClaimResponse, TetherError> {
        let outcome = self
            .queue
            .claim(worker_id.map(WorkerId::from), lease_secs)
            .await?;
        Ok(outcome.into())
    }

    pub async fn release(
        &self,
        task_id: &str,
        worker_id: Option<&str>,
        reason: Option<&str>,
    ) -> Result<Ack, TetherError> {
        let worker_id = worker_id.map(WorkerId::from);
        self.queue
            .release(&TaskId::from(task_id), worker_id.as_ref(), reason)
            .await?;
        Ok(Ack::ok())
    }

    pub async fn renew(
        &self,
        task_id: &str,
        worker_id: &str,
        extend_secs: Option<u64>,
    ) -> Result<RenewResponse, TetherError> {
        let lease = self
            .queue
            .renew(&TaskId::from(task_id), &WorkerId::from(worker_id), extend_secs)
            .await?;
        Ok(RenewResponse {
            success: true,
            lease,
        })
    }

    /// `status` is one of `pending`, `processing`, `completed`, `failed`.
    pub async fn status(&self, task_id: &str, status: &str) -> Result<StatusResponse, TetherError> {
        let status: TaskStatus = status
            .parse()
            .map_err(|e: crate::domain::UnknownStatus| TetherError::Validation(e.to_string()))?;
        let task = self
            .queue
            .update_status(&TaskId::from(task_id), status)
            .await?;
        Ok(StatusResponse {
            success: true,
            status: task.status,
        })
    }

    pub async fn complete(&self, task_id: &str, result: TaskResult) -> Result<Ack, TetherError> {
        self.queue.complete(&TaskId::from(task_id), result).await?;
        Ok(Ack::ok())
    }

    pub async fn result(&self, task_id: &str) -> Result<TaskResult, TetherError> {
        Ok(self.queue.get_result(&TaskId::from(task_id)).await?)
    }

    pub async fn task(&self, task_id: &str) -> Result<Task, TetherError> {
        Ok(self.queue.get_task(&TaskId::from(task_id)).await?)
    }

    pub async fn counts(&self) -> Result<QueueCounts, TetherError> {
        Ok(self.queue.counts().await?)
    }

    /// Never fails; store trouble degrades to the in-memory window.
    pub async fn check_rate_limit(&self, channel: &str, identifier: &str) -> RateDecision {
        self.limiter.check(channel, identifier).await
    }

    pub async fn execute<F, Fut, T, E>(
        &self,
        dependency: &str,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breakers.execute(dependency, operation).await
    }

    pub fn circuit_stats(&self) -> Vec<CircuitStats> {
        self.breakers.stats()
    }
}
