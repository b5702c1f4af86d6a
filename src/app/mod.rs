pub mod message_handler;
pub mod ports;
pub mod publication_event;

pub use message_handler::{HandleOutcome, NativeMessageHandler};
