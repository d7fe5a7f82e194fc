use crate::task::TaskStatus;

/// Default retry ceiling when none is configured
pub const DEFAULT_MAX_RETRIES: u32 = 3;

impl TaskStatus {
    /// `Success` and `Failed` admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// Legal transitions:
    /// `Pending -> InProgress -> {Success | Retrying | Failed}` and
    /// `Retrying -> InProgress` on redelivery.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (InProgress, Success) | (InProgress, Retrying) | (InProgress, Failed) | (Retrying, InProgress)
        )
    }
}

/// What to do with a task after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Mark `Retrying` and nack-requeue the message for redelivery
    Retry,
    /// Mark `Failed` and ack the message so the broker stops redelivering
    GiveUp,
}

/// Bounded-retry policy applied after every failed attempt
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy { max_retries }
    }

    /// Decide from the retry count *after* it was incremented for the
    /// failure being recorded. With `max_retries = 3` the fourth failed
    /// attempt (`retry_count = 4`) gives up.
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count > self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry
        }
    }
}
