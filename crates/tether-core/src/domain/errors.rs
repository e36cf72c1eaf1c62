//! Errors - キュー操作のエラー型と分類
//!
//! # 分類
//! - NotFound: タスク・結果が存在しない（期限切れを含む）
//! - LeaseConflict: lease の保持者ではない（release / renew）
//! - InvalidLease: 有効な lease が存在しない（renew）
//! - Store: ストア障害。キューは内部でリトライしない
//! - Validation: 境界での入力エラー
//!
//! RaceLost は claim の内部でのみ使い、呼び出し元には出さない。

use crate::domain::ids::{TaskId, WorkerId};
use crate::ports::StoreError;

/// ErrorKind は呼び出し元が次に何をすべきかの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// すぐに再試行してよい
    Transient,
    /// 再試行しても結果は変わらない
    Permanent,
    /// インフラ障害（ストア）
    Infrastructure,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("result for task {0} not found")]
    ResultNotFound(TaskId),

    #[error("worker {worker_id} is not the lease holder of task {task_id}")]
    LeaseConflict { task_id: TaskId, worker_id: WorkerId },

    #[error("no live lease for task {0}")]
    InvalidLease(TaskId),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::LeaseConflict { .. } => ErrorKind::Transient,
            QueueError::Store(_) => ErrorKind::Infrastructure,
            QueueError::TaskNotFound(_)
            | QueueError::ResultNotFound(_)
            | QueueError::InvalidLease(_)
            | QueueError::Validation(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Infrastructure)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::TaskNotFound(_) | QueueError::ResultNotFound(_))
    }
}
