use crate::error::{Result, TaskError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace prefix shared by every task queue
pub const QUEUE_PREFIX: &str = "task_queue_";

/// Derive the queue name for a task type. Deterministic and pure: the
/// lower-cased type under a fixed prefix, e.g. `FetchOrders` ->
/// `task_queue_fetchorders`.
pub fn queue_name(task_type: &str) -> String {
    format!("{}{}", QUEUE_PREFIX, task_type.to_lowercase())
}

/// Wire format of a queued task: a JSON object `{taskType, payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(rename = "taskType")]
    pub task_type: String,
    pub payload: Value,
}

impl TaskEnvelope {
    pub fn new(task_type: impl Into<String>, payload: Value) -> Self {
        TaskEnvelope {
            task_type: task_type.into(),
            payload,
        }
    }

    /// Queue this envelope belongs on, derived from its task type
    pub fn queue_name(&self) -> String {
        queue_name(&self.task_type)
    }

    /// Encode to bytes for publishing. A payload that cannot be encoded
    /// surfaces as `TaskError::Serialization` to the publisher; the task is
    /// never silently dropped.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(TaskError::from)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(TaskError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_name_is_lowercased_and_prefixed() {
        assert_eq!(queue_name("FetchOrders"), "task_queue_fetchorders");
        assert_eq!(queue_name("GeneratePDF"), "task_queue_generatepdf");
        assert_eq!(queue_name("sendemail"), "task_queue_sendemail");
    }

    #[test]
    fn test_envelope_wire_field_names() {
        let envelope = TaskEnvelope::new("FetchOrders", json!({"customerId": "cust-42"}));
        let bytes = envelope.encode().unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(raw["taskType"], "FetchOrders");
        assert_eq!(raw["payload"]["customerId"], "cust-42");
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = TaskEnvelope::new(
            "CreateInvoice",
            json!({"customerId": "cust-7", "orders": ["o-1", "o-2"]}),
        );
        let decoded = TaskEnvelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(TaskEnvelope::decode(b"not json").is_err());
        assert!(TaskEnvelope::decode(b"{\"payload\": {}}").is_err());
    }
}
