//! WorkerLoop - claim → processing → handle → complete
//!
//! # フロー
//! 1. TaskQueue::claim() で lease を取る（無ければ idle_interval 待つ）
//! 2. status を processing に更新
//! 3. Handler 実行中はバックグラウンドで lease/3 ごとに renew（ハートビート）
//! 4. 成功なら completed、失敗なら failed にして complete() で結果を書く
//!
//! ワーカーが途中で死んでも lease の期限切れで別のワーカーが拾える。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{QueueError, Task, TaskId, TaskResult, TaskStatus, WorkerId};
use crate::queue::{ClaimOutcome, TaskQueue};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// TaskHandler は claim したタスクを処理する
///
/// # 使用例
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl TaskHandler for Echo {
///     async fn handle(&self, task: &Task) -> Result<serde_json::Value, HandlerError> {
///         Ok(task.payload.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<serde_json::Value, HandlerError>;
}

/// What one iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Idle,
    Completed(TaskId),
    Failed(TaskId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub completed: u64,
    pub failed: u64,
    pub errors: u64,
}

pub struct WorkerLoop {
    queue: Arc<TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    worker_id: WorkerId,
    lease_secs: u64,
    idle_interval: Duration,
}

impl WorkerLoop {
    pub fn new(queue: Arc<TaskQueue>, handler: Arc<dyn TaskHandler>, worker_id: WorkerId) -> Self {
        let lease_secs = queue.config().clamp_lease(None);
        Self {
            queue,
            handler,
            worker_id,
            lease_secs,
            idle_interval: Duration::from_millis(500),
        }
    }

    pub fn with_lease_secs(mut self, lease_secs: u64) -> Self {
        self.lease_secs = self.queue.config().clamp_lease(Some(lease_secs));
        self
    }

    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs((self.lease_secs / 3).max(1))
    }

    /// Claim at most one task and drive it to completion.
    pub async fn run_once(&self) -> Result<Step, QueueError> {
        let outcome = self
            .queue
            .claim(Some(self.worker_id.clone()), Some(self.lease_secs))
            .await?;
        let task = match outcome {
            ClaimOutcome::Claimed { task, .. } => task,
            ClaimOutcome::Empty { pending } => {
                debug!(worker_id = %self.worker_id, pending, "nothing to claim");
                return Ok(Step::Idle);
            }
        };
        let task_id = task.id.clone();

        self.queue
            .update_status(&task_id, TaskStatus::Processing)
            .await?;

        let heartbeat = self.spawn_heartbeat(task_id.clone());
        let handled = self.handler.handle(&task).await;
        heartbeat.abort();

        let (status, result) = match handled {
            Ok(output) => (TaskStatus::Completed, TaskResult::success(output)),
            Err(error) => {
                warn!(worker_id = %self.worker_id, task_id = %task_id, error = %error, "handler failed");
                (TaskStatus::Failed, TaskResult::failure(error.0))
            }
        };

        self.queue.update_status(&task_id, status).await?;
        self.queue.complete(&task_id, result).await?;

        Ok(match status {
            TaskStatus::Completed => Step::Completed(task_id),
            _ => Step::Failed(task_id),
        })
    }

    /// Loop until `shutdown` flips to true. In-flight work is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerReport {
        let mut report = WorkerReport::default();
        info!(worker_id = %self.worker_id, lease_secs = self.lease_secs, "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(Step::Completed(_)) => {
                    report.completed += 1;
                    false
                }
                Ok(Step::Failed(_)) => {
                    report.failed += 1;
                    false
                }
                Ok(Step::Idle) => true,
                Err(error) => {
                    report.errors += 1;
                    warn!(worker_id = %self.worker_id, error = %error, "worker iteration failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(self.idle_interval) => {}
                }
            }
        }

        info!(
            worker_id = %self.worker_id,
            completed = report.completed,
            failed = report.failed,
            errors = report.errors,
            "worker stopped"
        );
        report
    }

    fn spawn_heartbeat(&self, task_id: TaskId) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let worker_id = self.worker_id.clone();
        let lease_secs = self.lease_secs;
        let every = self.heartbeat_interval();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                if let Err(error) = queue.renew(&task_id, &worker_id, Some(lease_secs)).await {
                    // lease を失ったら以降の renew も通らない
                    warn!(task_id = %task_id, worker_id = %worker_id, error = %error, "heartbeat renew failed");
                    break;
                }
            }
        })
    }
}

/// Worker group handle.
/// - `request_shutdown` で新しい claim を止める（実行中の handler は最後まで走る）
/// - `shutdown_and_join()` で全ワーカーの終了を待ち、レポートを集める
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<WorkerReport>>,
}

impl WorkerGroup {
    pub fn spawn(workers: Vec<WorkerLoop>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let joins = workers
            .into_iter()
            .map(|worker| {
                let rx = shutdown_rx.clone();
                tokio::spawn(async move { worker.run(rx).await })
            })
            .collect();
        Self { shutdown_tx, joins }
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) -> WorkerReport {
        self.request_shutdown();
        let mut total = WorkerReport::default();
        for join in self.joins {
            match join.await {
                Ok(report) => {
                    total.completed += report.completed;
                    total.failed += report.failed;
                    total.errors += report.errors;
                }
                Err(error) => warn!(error = %error, "worker task panicked or was cancelled"),
            }
        }
        total
    }
}
