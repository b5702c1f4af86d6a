use crate::domain::{ConsumerInstance, Message, NativeMessage};
use crate::error::Result;
use async_trait::async_trait;

/// Anything the health endpoints can probe. `Ok` carries a human-readable summary.
#[async_trait]
pub trait ConnectivityCheckPort: Send + Sync {
    async fn connectivity_check(&self) -> Result<String>;
}

#[async_trait]
pub trait ContentWriterPort: ConnectivityCheckPort {
    fn get_collection(&self, origin_id: &str, content_type: &str) -> Result<String>;

    /// Writes the message and returns the extracted content UUID.
    async fn write_to_collection(&self, msg: &NativeMessage, collection: &str) -> Result<String>;
}

#[async_trait]
pub trait MessageProducerPort: ConnectivityCheckPort {
    async fn send_message(&self, msg: &Message) -> Result<()>;
}

// Queue-side ports
#[async_trait]
pub trait QueueProxyPort: Send + Sync {
    async fn create_instance(&self) -> Result<ConsumerInstance>;
    async fn consume(&self, instance: &ConsumerInstance) -> Result<Vec<Message>>;
    async fn commit_offsets(&self, instance: &ConsumerInstance) -> Result<()>;
    async fn destroy_instance(&self, instance: &ConsumerInstance) -> Result<()>;
    async fn check_connectivity(&self) -> Result<String>;
}

#[async_trait]
pub trait MessageHandlerPort: Send + Sync {
    async fn handle_message(&self, msg: Message);
}
