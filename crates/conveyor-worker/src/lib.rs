pub mod config;
pub mod coordinator;
pub mod executor;
pub mod handler;
pub mod metrics;
pub mod processor;

pub use config::WorkerConfig;
pub use coordinator::WorkflowCoordinator;
pub use handler::{HandlerRegistry, TaskHandler};
pub use metrics::WorkerMetrics;
pub use processor::TaskProcessor;
