use crate::connection::{BrokerConnection, InboundMessage, MessageHandler};
use crate::Result;
use async_trait::async_trait;
use conveyor_core::{queue_name, TaskEnvelope};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Receives decoded task envelopes from a subscribed queue
#[async_trait]
pub trait TaskConsumer: Send + Sync {
    async fn on_task(&self, envelope: TaskEnvelope, message: InboundMessage);
}

/// Semantic layer over the broker connection: task-type to queue-name
/// mapping plus envelope encoding on publish and decoding on consume.
pub struct QueueGateway {
    broker: Arc<BrokerConnection>,
}

impl QueueGateway {
    pub fn new(broker: Arc<BrokerConnection>) -> Self {
        QueueGateway { broker }
    }

    /// Enqueue a task of the given type. The envelope is published
    /// persistently to the type's queue with a fresh correlation id in the
    /// message properties; the id is returned for tracing.
    ///
    /// Encoding failures surface synchronously; the task is never silently
    /// dropped.
    pub async fn publish_task(&self, task_type: &str, payload: Value) -> Result<String> {
        let envelope = TaskEnvelope::new(task_type, payload);
        let bytes = envelope.encode()?;
        let queue = envelope.queue_name();
        let correlation_id = Uuid::new_v4().to_string();

        self.broker
            .publish(&queue, &bytes, Some(&correlation_id))
            .await?;

        info!(queue = %queue, correlation_id = %correlation_id, "enqueued {} task", task_type);
        Ok(correlation_id)
    }

    /// Register the consumer for one task type's queue
    pub async fn subscribe_task(&self, task_type: &str, consumer: Arc<dyn TaskConsumer>) -> Result<()> {
        let queue = queue_name(task_type);
        self.broker.declare_queue(&queue).await?;
        self.broker
            .subscribe(&queue, Arc::new(EnvelopeHandler { consumer }))
            .await
    }
}

/// Decodes raw deliveries into task envelopes before dispatch
struct EnvelopeHandler {
    consumer: Arc<dyn TaskConsumer>,
}

#[async_trait]
impl MessageHandler for EnvelopeHandler {
    async fn handle(&self, message: InboundMessage) {
        match TaskEnvelope::decode(&message.body) {
            Ok(envelope) => self.consumer.on_task(envelope, message).await,
            Err(err) => {
                // No task record can ever be created for an undecodable
                // body; requeueing it would redeliver forever.
                error!("discarding undecodable message: {}", err);
                if let Err(reject_err) = message.reject().await {
                    warn!("failed to reject poison message: {}", reject_err);
                }
            }
        }
    }
}
