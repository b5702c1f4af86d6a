pub mod http_client;
pub mod native_writer;
pub mod producer;
pub mod queue_proxy;

pub use http_client::{AgeingClient, ClientSettings};
pub use native_writer::NativeWriter;
pub use producer::{HttpMessageProducer, ProducerConfig};
pub use queue_proxy::HttpQueueProxy;
