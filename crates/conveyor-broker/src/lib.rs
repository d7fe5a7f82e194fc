mod connection;
mod gateway;

pub use connection::{BrokerConnection, BrokerSettings, InboundMessage, MessageHandler};
pub use gateway::{QueueGateway, TaskConsumer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("broker connection is closed")]
    Closed,

    #[error("a consumer is already registered for queue '{0}'")]
    ConsumerExists(String),

    #[error(transparent)]
    Task(#[from] conveyor_core::TaskError),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
