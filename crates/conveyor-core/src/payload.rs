//! Typed payload schemas for the built-in workflow steps.
//!
//! The wire envelope carries a schema-free JSON payload; each handler
//! deserializes into its schema here before doing any work, so a malformed
//! payload fails closed at decode time instead of partway through execution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOrdersPayload {
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    pub customer_id: String,
    #[serde(default)]
    pub orders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfPayload {
    pub invoice_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailPayload {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_orders_wire_names() {
        let payload: FetchOrdersPayload =
            serde_json::from_value(json!({"customerId": "cust-42"})).unwrap();
        assert_eq!(payload.customer_id, "cust-42");

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"customerId": "cust-42"}));
    }

    #[test]
    fn test_create_invoice_orders_default_empty() {
        let payload: CreateInvoicePayload =
            serde_json::from_value(json!({"customerId": "cust-7"})).unwrap();
        assert!(payload.orders.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        assert!(serde_json::from_value::<FetchOrdersPayload>(json!({})).is_err());
        assert!(serde_json::from_value::<SendEmailPayload>(json!({"to": "x"})).is_err());
    }
}
