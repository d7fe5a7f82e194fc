use async_trait::async_trait;
use conveyor_core::payload::{
    CreateInvoicePayload, FetchOrdersPayload, GeneratePdfPayload, SendEmailPayload,
};
use conveyor_core::HandlerError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The pluggable business-logic boundary: one handler per task type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, payload: &Value) -> Result<(), HandlerError>;
}

/// Registry of task handlers keyed by task type
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<H: TaskHandler + 'static>(&self, task_type: &str, handler: H) {
        self.handlers
            .write()
            .insert(task_type.to_string(), Arc::new(handler));
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().get(task_type).cloned()
    }

    pub fn has_handler(&self, task_type: &str) -> bool {
        self.handlers.read().contains_key(task_type)
    }

    pub fn task_types(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload.clone()).map_err(|e| HandlerError::InvalidPayload(e.to_string()))
}

/// Fetches a customer's open orders
pub struct FetchOrdersHandler;

#[async_trait]
impl TaskHandler for FetchOrdersHandler {
    async fn run(&self, payload: &Value) -> Result<(), HandlerError> {
        let payload: FetchOrdersPayload = decode(payload)?;
        debug!(customer_id = %payload.customer_id, "fetching orders");
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}

/// Creates an invoice from a set of orders
pub struct CreateInvoiceHandler;

#[async_trait]
impl TaskHandler for CreateInvoiceHandler {
    async fn run(&self, payload: &Value) -> Result<(), HandlerError> {
        let payload: CreateInvoicePayload = decode(payload)?;
        debug!(customer_id = %payload.customer_id, orders = payload.orders.len(), "creating invoice");
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}

/// Renders the PDF for an invoice
pub struct GeneratePdfHandler;

#[async_trait]
impl TaskHandler for GeneratePdfHandler {
    async fn run(&self, payload: &Value) -> Result<(), HandlerError> {
        let payload: GeneratePdfPayload = decode(payload)?;
        debug!(invoice_id = %payload.invoice_id, "generating invoice PDF");
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}

/// Emails the finished invoice to the customer
pub struct SendEmailHandler;

#[async_trait]
impl TaskHandler for SendEmailHandler {
    async fn run(&self, payload: &Value) -> Result<(), HandlerError> {
        let payload: SendEmailPayload = decode(payload)?;
        debug!(email = %payload.email, "sending email");
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}
