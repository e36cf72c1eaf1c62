//! Outcome model: the result a worker hands back through `complete`.
//!
//! Results are written once, never updated, and expire after the configured
//! retention. The producer reads them with `result(task_id)`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(output: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn success_empty() -> Self {
        Self {
            success: true,
            output: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn with_output(mut self, output: impl Into<serde_json::Value>) -> Self {
        self.output = Some(output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(TaskResult::success_empty()).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));

        let json = serde_json::to_value(TaskResult::failure("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "boom" }));
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let result: TaskResult = serde_json::from_str(r#"{"success":true,"output":"done"}"#).unwrap();
        assert_eq!(result, TaskResult::success("done"));
    }

    #[test]
    fn failure_can_carry_partial_output() {
        let result = TaskResult::failure("timeout").with_output(serde_json::json!({"processed": 3}));
        assert!(!result.success);
        assert_eq!(result.output.unwrap()["processed"], 3);
    }
}
