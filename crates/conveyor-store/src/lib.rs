mod store;

pub use store::{TaskStore, TaskStoreConfig};

use conveyor_core::TaskId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error(transparent)]
    Task(#[from] conveyor_core::TaskError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
