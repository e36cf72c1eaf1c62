//! Task body stored under `queue:task:{id}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::state::TaskStatus;

/// A unit of work as written by the producer.
///
/// The body is the only place status lives; the pending list holds ids only
/// and leases never embed the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id,
            payload,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_task_is_pending() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let task = Task::new(TaskId::new("t1"), serde_json::json!({"k": 1}), now);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn set_status_touches_updated_at_only() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap();
        let mut task = Task::new(TaskId::new("t1"), serde_json::Value::Null, t0);
        task.set_status(TaskStatus::Processing, t1);
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.created_at, t0);
        assert_eq!(task.updated_at, t1);
    }

    #[test]
    fn task_json_uses_camel_case() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let task = Task::new(TaskId::new("t1"), serde_json::Value::Null, now);
        let value = serde_json::to_value(&task).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert_eq!(value["status"], "pending");
    }
}
