pub mod config;
pub mod consumer;
pub mod wire;

pub use config::{CommitFailurePolicy, QueueConfig};
pub use consumer::QueueConsumer;
