mod envelope;
mod error;
mod lifecycle;
mod task;

pub use envelope::{queue_name, TaskEnvelope, QUEUE_PREFIX};
pub use error::{HandlerError, Result, TaskError};
pub use lifecycle::{RetryDecision, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use task::{Task, TaskId, TaskStatus, TaskType};

pub mod payload;
pub mod task_types;
