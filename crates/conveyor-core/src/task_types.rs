//! Task type names for the built-in invoice workflow steps.

pub const FETCH_ORDERS: &str = "FetchOrders";
pub const CREATE_INVOICE: &str = "CreateInvoice";
pub const GENERATE_PDF: &str = "GeneratePDF";
pub const SEND_EMAIL: &str = "SendEmail";

/// The task types a default worker subscribes to
pub const ALL: &[&str] = &[FETCH_ORDERS, CREATE_INVOICE, GENERATE_PDF, SEND_EMAIL];
