use crate::constants::PARTIAL_CONTENT_MESSAGE_TYPE;
use crate::domain::{Message, NativeMessage};
use crate::error::{IngesterError, Result};

/// A consumed queue message viewed as a content publication.
pub struct PublicationEvent<'a> {
    msg: &'a Message,
}

impl<'a> PublicationEvent<'a> {
    pub fn new(msg: &'a Message) -> Self {
        Self { msg }
    }

    pub fn transaction_id(&self) -> &str {
        self.msg.transaction_id()
    }

    pub fn origin_system_id(&self) -> &str {
        self.msg.origin_system_id()
    }

    pub fn content_type(&self) -> &str {
        self.msg.content_type().unwrap_or_default()
    }

    /// Builds the store write request. Fails before any body work when the
    /// timestamp header is absent.
    pub fn native_message(&self) -> Result<NativeMessage> {
        let timestamp = self.msg.timestamp().ok_or(IngesterError::MissingTimestamp)?;
        let mut native = NativeMessage::new(&self.msg.body, timestamp, self.transaction_id())?;

        if let Some(hash) = self.msg.native_hash() {
            native.add_hash_header(hash);
        }
        if let Some(content_type) = self.msg.content_type() {
            native.add_content_type_header(content_type);
        }
        let origin = self.origin_system_id();
        if !origin.is_empty() {
            native.add_origin_system_id_header(origin);
        }
        if self.msg.message_type() == Some(PARTIAL_CONTENT_MESSAGE_TYPE) {
            native.mark_partial();
        }
        Ok(native)
    }

    /// The message re-published downstream: original headers and body, untouched.
    pub fn producer_message(&self) -> Message {
        self.msg.clone()
    }
}
