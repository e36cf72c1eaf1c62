//! Wire shapes returned by [`super::Hub`].
//!
//! Transport-agnostic: every type serialises with camelCase field names so an
//! HTTP layer can hand them straight to a JSON encoder.

use serde::{Deserialize, Serialize};

use crate::domain::{Lease, Task, TaskId, TaskStatus};
use crate::queue::ClaimOutcome;

pub const NO_TASKS_MESSAGE: &str = "no tasks available";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedTask {
    pub success: bool,
    pub task_id: TaskId,
    pub task: Task,
    pub lease: Lease,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoTaskAvailable {
    pub success: bool,
    pub message: String,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimResponse {
    Claimed(ClaimedTask),
    Empty(NoTaskAvailable),
}

impl ClaimResponse {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimResponse::Claimed(_))
    }

    pub fn claimed(&self) -> Option<&ClaimedTask> {
        match self {
            ClaimResponse::Claimed(claimed) => Some(claimed),
            ClaimResponse::Empty(_) => None,
        }
    }
}

impl From<ClaimOutcome> for ClaimResponse {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Claimed { task, lease } => ClaimResponse::Claimed(ClaimedTask {
                success: true,
                task_id: task.id.clone(),
                task,
                lease,
            }),
            ClaimOutcome::Empty { pending } => ClaimResponse::Empty(NoTaskAvailable {
                success: false,
                message: NO_TASKS_MESSAGE.to_string(),
                pending,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewResponse {
    pub success: bool,
    pub lease: Lease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub success: bool,
    pub task_id: TaskId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_claim_serialises_flat() {
        let response = ClaimResponse::from(ClaimOutcome::Empty { pending: 3 });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": false, "message": "no tasks available", "pending": 3 })
        );
    }

    #[test]
    fn enqueue_response_uses_camel_case() {
        let response = EnqueueResponse {
            success: true,
            task_id: TaskId::new("t1"),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": true, "taskId": "t1" })
        );
    }
}
