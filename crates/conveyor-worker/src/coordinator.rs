use conveyor_broker::QueueGateway;
use conveyor_core::payload::FetchOrdersPayload;
use conveyor_core::{task_types, TaskError};
use std::sync::Arc;
use tracing::info;

/// Publishes the first step of the invoice workflow. Later steps are not
/// chained here; an orchestrator watching terminal statuses would schedule
/// them.
pub struct WorkflowCoordinator {
    gateway: Arc<QueueGateway>,
}

impl WorkflowCoordinator {
    pub fn new(gateway: Arc<QueueGateway>) -> Self {
        WorkflowCoordinator { gateway }
    }

    /// Enqueue `FetchOrders` for a customer; returns the correlation id of
    /// the published message
    pub async fn start_invoice_workflow(&self, customer_id: &str) -> conveyor_broker::Result<String> {
        info!(customer_id = %customer_id, "starting invoice workflow");

        let payload = serde_json::to_value(FetchOrdersPayload {
            customer_id: customer_id.to_string(),
        })
        .map_err(TaskError::from)?;

        self.gateway
            .publish_task(task_types::FETCH_ORDERS, payload)
            .await
    }
}
