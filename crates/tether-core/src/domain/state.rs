//! State - タスクの状態
//!
//! 状態は worker が `UpdateStatus` で書き換える。lease とは独立しており、
//! 状態を変えても lease の期限は変わらない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TaskStatus はタスク本体に記録される状態
///
/// # 状態遷移（典型）
/// - pending: enqueue 直後
/// - processing: worker が claim して処理中
/// - completed: 処理成功（Complete の直前に書かれる）
/// - failed: 処理失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskStatus::Pending, "\"pending\"")]
    #[case(TaskStatus::Processing, "\"processing\"")]
    #[case(TaskStatus::Completed, "\"completed\"")]
    #[case(TaskStatus::Failed, "\"failed\"")]
    fn status_serializes_lowercase(#[case] status: TaskStatus, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&status).unwrap(), expected);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Processing".parse::<TaskStatus>(), Ok(TaskStatus::Processing));
        assert!("stalled".parse::<TaskStatus>().is_err());
    }
}
