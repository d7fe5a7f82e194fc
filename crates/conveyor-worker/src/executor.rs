use crate::handler::TaskHandler;
use conveyor_core::HandlerError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Runs one execution attempt under a hard per-task timeout, so a hung
/// handler cannot hold its message unacknowledged indefinitely.
pub struct TaskExecutor {
    task_timeout: Duration,
}

impl TaskExecutor {
    pub fn new(task_timeout: Duration) -> Self {
        TaskExecutor { task_timeout }
    }

    pub async fn execute(
        &self,
        handler: Arc<dyn TaskHandler>,
        payload: &Value,
    ) -> Result<(), HandlerError> {
        match timeout(self.task_timeout, handler.run(payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("handler exceeded timeout of {:?}", self.task_timeout);
                Err(HandlerError::Timeout(self.task_timeout.as_secs()))
            }
        }
    }
}
