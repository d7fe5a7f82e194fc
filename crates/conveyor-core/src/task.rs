use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for a task record, assigned monotonically by the store
pub type TaskId = u64;

/// Task type name (e.g. "FetchOrders")
pub type TaskType = String;

/// Lifecycle status of a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Record created, execution not started yet
    Pending,
    /// Handler is currently running
    InProgress,
    /// Handler finished successfully (terminal)
    Success,
    /// Retries exhausted (terminal)
    Failed,
    /// Attempt failed, waiting for broker redelivery
    Retrying,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Retrying => "RETRYING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILED" => Some(TaskStatus::Failed),
            "RETRYING" => Some(TaskStatus::Retrying),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of one unit of work.
///
/// Owned exclusively by the task store; the processor only holds a transient
/// copy during a single execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Monotonic identifier, immutable once assigned and never reused
    pub id: TaskId,

    /// Names the handler that executes this task
    pub task_type: TaskType,

    /// Opaque payload, passed to the handler unmodified
    pub payload: Value,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Number of failed attempts recorded so far; never decreases
    pub retry_count: u32,

    /// When the most recent failure was recorded
    pub last_error_at: Option<DateTime<Utc>>,

    /// Message of the most recent failure, for operator inspection
    pub last_error_message: Option<String>,

    /// Stable per-logical-task correlation id (AMQP message id), if the
    /// producer supplied one
    pub correlation_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh record in `Pending` with a zero retry count
    pub fn new(id: TaskId, task_type: TaskType, payload: Value, correlation_id: Option<String>) -> Self {
        let now = Utc::now();
        Task {
            id,
            task_type,
            payload,
            status: TaskStatus::Pending,
            retry_count: 0,
            last_error_at: None,
            last_error_message: None,
            correlation_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new(1, "FetchOrders".to_string(), json!({"customerId": "c-1"}), None);

        assert_eq!(task.id, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.last_error_message.is_none());
        assert!(task.last_error_at.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Retrying,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("DONE"), None);
    }

    #[test]
    fn test_status_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
