use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::app::ports::{ContentWriterPort, MessageHandlerPort, MessageProducerPort};
use crate::app::publication_event::PublicationEvent;
use crate::domain::Message;
use crate::metrics::IngestMetrics;

/// What happened to one consumed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Written to the store, and forwarded when forwarding is configured.
    Ingested { uuid: String, forwarded: bool },
    /// Written to the store but the downstream publish failed.
    ForwardFailed { uuid: String },
    /// Origin or content type outside the routing whitelist.
    Skipped,
    /// Unparseable message or failed write.
    Dropped,
}

/// Runs one publication through transform, routing, native write and forwarding.
pub struct NativeMessageHandler {
    writer: Arc<dyn ContentWriterPort>,
    producer: Option<Arc<dyn MessageProducerPort>>,
}

impl NativeMessageHandler {
    pub fn new(writer: Arc<dyn ContentWriterPort>) -> Self {
        Self {
            writer,
            producer: None,
        }
    }

    /// Forward every successfully written message to `producer`.
    pub fn forward_to(mut self, producer: Arc<dyn MessageProducerPort>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn forwards(&self) -> bool {
        self.producer.is_some()
    }

    pub async fn process(&self, msg: &Message) -> HandleOutcome {
        let event = PublicationEvent::new(msg);
        let tid = event.transaction_id();

        let native = match event.native_message() {
            Ok(native) => native,
            Err(e) => {
                error!(transaction_id = %tid, error = %e, "Error building native message from publication event. Ignoring message.");
                IngestMetrics::record_parse_error();
                return HandleOutcome::Dropped;
            }
        };

        let collection = match self
            .writer
            .get_collection(event.origin_system_id(), event.content_type())
        {
            Ok(collection) => collection,
            Err(e) if e.is_routing_skip() => {
                info!(
                    transaction_id = %tid,
                    origin_system_id = %event.origin_system_id(),
                    content_type = %event.content_type(),
                    reason = %e,
                    "Skipping content because of not whitelisted Origin-System-Id or Content-Type"
                );
                IngestMetrics::record_routing_skipped();
                return HandleOutcome::Skipped;
            }
            Err(e) => {
                error!(transaction_id = %tid, error = %e, "Couldn't resolve the destination collection. Ignoring message.");
                return HandleOutcome::Dropped;
            }
        };

        let uuid = match self.writer.write_to_collection(&native, &collection).await {
            Ok(uuid) => uuid,
            Err(e) => {
                error!(transaction_id = %tid, collection = %collection, error = %e, "Failed to write native content");
                if e.is_parse_error() {
                    IngestMetrics::record_parse_error();
                } else {
                    IngestMetrics::record_write_error();
                }
                return HandleOutcome::Dropped;
            }
        };

        let mut forwarded = false;
        if let Some(producer) = &self.producer {
            info!(transaction_id = %tid, uuid = %uuid, "Forwarding consumed message to different queue");
            if let Err(e) = producer.send_message(&event.producer_message()).await {
                error!(transaction_id = %tid, uuid = %uuid, error = %e, "Failed to forward consumed message to a different queue");
                IngestMetrics::record_forward_error();
                return HandleOutcome::ForwardFailed { uuid };
            }
            IngestMetrics::record_forwarded();
            forwarded = true;
        }

        info!(
            monitoring_event = true,
            event = "Ingest",
            transaction_id = %tid,
            uuid = %uuid,
            content_type = %event.content_type(),
            "Successfully ingested"
        );
        IngestMetrics::record_ingested();
        HandleOutcome::Ingested { uuid, forwarded }
    }
}

#[async_trait]
impl MessageHandlerPort for NativeMessageHandler {
    async fn handle_message(&self, msg: Message) {
        self.process(&msg).await;
    }
}
