use crate::task::TaskStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Failure of one execution attempt. Caught by the processor and fed into
/// the retry state machine; never propagated to the broker layer as a fatal
/// fault.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("no handler registered for task type '{0}'")]
    UnknownTaskType(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("task execution timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_message_names_the_type() {
        let err = HandlerError::UnknownTaskType("GenerateReport".to_string());
        assert!(err.to_string().contains("GenerateReport"));
        assert!(err.to_string().contains("no handler registered"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = TaskError::InvalidTransition {
            from: TaskStatus::Failed,
            to: TaskStatus::InProgress,
        };
        assert_eq!(err.to_string(), "invalid status transition: FAILED -> IN_PROGRESS");
    }
}
