use crate::executor::TaskExecutor;
use crate::handler::HandlerRegistry;
use crate::metrics::WorkerMetrics;
use async_trait::async_trait;
use conveyor_broker::{InboundMessage, QueueGateway, TaskConsumer};
use conveyor_core::{HandlerError, RetryPolicy, Task, TaskEnvelope, TaskStatus};
use conveyor_store::TaskStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Broker acknowledgment to issue after the store reflects an attempt's
/// outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckAction {
    /// Remove the message permanently
    Ack,
    /// Requeue for redelivery
    NackRequeue,
}

/// Map a post-attempt status to its broker acknowledgment. Terminal states
/// ack (nothing left to redeliver - a permanently failed task included);
/// `Retrying` hands the message back for another attempt.
pub fn reconcile(status: TaskStatus) -> AckAction {
    match status {
        TaskStatus::Retrying => AckAction::NackRequeue,
        _ => AckAction::Ack,
    }
}

/// Consumer loop for a fixed set of task types: decodes envelopes, tracks
/// each attempt in the task store, executes the registered handler, and
/// reconciles the outcome with the broker.
///
/// Side effects are strictly ordered per message: the store reflects
/// `InProgress` before the handler runs, and the terminal or retry status
/// before the broker acknowledgment is issued. A crash in between yields a
/// redelivery and a duplicate record, never silent loss.
pub struct TaskProcessor {
    gateway: Arc<QueueGateway>,
    store: Arc<TaskStore>,
    registry: Arc<HandlerRegistry>,
    policy: RetryPolicy,
    executor: TaskExecutor,
    metrics: Arc<WorkerMetrics>,
}

impl TaskProcessor {
    pub fn new(
        gateway: Arc<QueueGateway>,
        store: Arc<TaskStore>,
        registry: Arc<HandlerRegistry>,
        policy: RetryPolicy,
        executor: TaskExecutor,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        TaskProcessor {
            gateway,
            store,
            registry,
            policy,
            executor,
            metrics,
        }
    }

    /// Subscribe to the queue of every registered task type
    pub async fn start(self: &Arc<Self>) -> conveyor_broker::Result<()> {
        let mut task_types = self.registry.task_types();
        task_types.sort();

        for task_type in task_types {
            self.gateway
                .subscribe_task(&task_type, self.clone() as Arc<dyn TaskConsumer>)
                .await?;
            info!(task_type = %task_type, "processor subscribed");
        }
        Ok(())
    }

    /// Run one delivery through the lifecycle and report which
    /// acknowledgment to issue. All store writes happen in here, before the
    /// caller touches the broker.
    async fn run_attempt(
        &self,
        envelope: &TaskEnvelope,
        correlation_id: Option<&str>,
    ) -> anyhow::Result<(Task, AckAction)> {
        let record = self.resolve_record(envelope, correlation_id)?;
        let task = self.store.mark_in_progress(record.id)?;

        self.metrics.tasks_in_flight.inc();
        let started = Instant::now();

        let outcome = match self.registry.get(&task.task_type) {
            Some(handler) => self.executor.execute(handler, &task.payload).await,
            // An unknown type can never resolve, but it still walks the
            // bounded retry path to a terminal FAILED record.
            None => Err(HandlerError::UnknownTaskType(task.task_type.clone())),
        };

        self.metrics.tasks_in_flight.dec();
        self.metrics
            .observe_duration(&task.task_type, started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                let task = self.store.mark_success(task.id)?;
                self.metrics.inc_tasks(task.status.as_str(), &task.task_type);
                info!(task_id = task.id, task_type = %task.task_type, "task succeeded");
                Ok((task, AckAction::Ack))
            }
            Err(err) => {
                warn!(
                    task_id = task.id,
                    task_type = %task.task_type,
                    retry_count = task.retry_count,
                    "attempt failed: {}",
                    err
                );
                let task = self.store.record_failure(task.id, &self.policy, &err.to_string())?;
                self.metrics.inc_tasks(task.status.as_str(), &task.task_type);

                if task.status == TaskStatus::Failed {
                    error!(
                        task_id = task.id,
                        task_type = %task.task_type,
                        retry_count = task.retry_count,
                        "task failed permanently: {}",
                        err
                    );
                }
                Ok((task.clone(), reconcile(task.status)))
            }
        }
    }

    /// Reuse the active record for a redelivered message; otherwise create a
    /// fresh one. Records stuck in `InProgress` (a crashed attempt) and
    /// terminal records are not resumed - the redelivery gets its own
    /// record.
    fn resolve_record(
        &self,
        envelope: &TaskEnvelope,
        correlation_id: Option<&str>,
    ) -> conveyor_store::Result<Task> {
        if let Some(cid) = correlation_id {
            if let Some(existing) = self.store.find_active_by_correlation(cid)? {
                if matches!(existing.status, TaskStatus::Retrying | TaskStatus::Pending) {
                    debug!(task_id = existing.id, correlation_id = %cid, "resuming record for redelivery");
                    return Ok(existing);
                }
            }
        }

        self.store
            .create(&envelope.task_type, envelope.payload.clone(), correlation_id)
    }
}

#[async_trait]
impl TaskConsumer for TaskProcessor {
    async fn on_task(&self, envelope: TaskEnvelope, message: InboundMessage) {
        let correlation_id = message.correlation_id.clone();
        if message.redelivered {
            debug!(
                task_type = %envelope.task_type,
                correlation_id = ?correlation_id,
                "processing redelivered message"
            );
        }

        match self.run_attempt(&envelope, correlation_id.as_deref()).await {
            Ok((task, AckAction::Ack)) => {
                if let Err(err) = message.ack().await {
                    warn!(task_id = task.id, "ack failed, message will be redelivered: {}", err);
                }
            }
            Ok((task, AckAction::NackRequeue)) => {
                if let Err(err) = message.nack_requeue().await {
                    warn!(task_id = task.id, "nack failed, message will be redelivered: {}", err);
                }
            }
            Err(err) => {
                // Store trouble: leave the record alone and hand the message
                // back to the broker for another attempt.
                error!("failed to process delivery: {}", err);
                if let Err(nack_err) = message.nack_requeue().await {
                    warn!("nack failed after processing error: {}", nack_err);
                }
            }
        }
    }
}
