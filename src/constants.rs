//! Header names and service defaults shared across the ingester.

// Inbound message headers
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";
pub const HEADER_ORIGIN_SYSTEM_ID: &str = "Origin-System-Id";
pub const HEADER_MESSAGE_TIMESTAMP: &str = "Message-Timestamp";
pub const HEADER_MESSAGE_TYPE: &str = "Message-Type";
pub const HEADER_NATIVE_HASH: &str = "Native-Hash";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

// Headers sent to the native store
pub const HEADER_X_NATIVE_HASH: &str = "X-Native-Hash";

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const PARTIAL_CONTENT_MESSAGE_TYPE: &str = "cms-partial-content-published";

// Body fields added before writing
pub const FIELD_LAST_MODIFIED: &str = "lastModified";
pub const FIELD_PUBLISH_REFERENCE: &str = "publishReference";

// Queue proxy
pub const KAFKA_BINARY_CONTENT_TYPE: &str = "application/vnd.kafka.binary.v1+json";
pub const FTMSG_VERSION_LINE: &str = "FTMSG/1.0";

pub const DEFAULT_OFFSET: &str = "largest";
pub const DEFAULT_STREAM_COUNT: usize = 1;
pub const DEFAULT_BACKOFF_SECONDS: u64 = 8;
pub const DEFAULT_NO_OF_PROCESSORS: usize = 100;
pub const DEFAULT_HEALTH_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_CLIENT_MAX_AGE_SECONDS: u64 = 60;

// Health checks
pub const SYSTEM_CODE: &str = "native-ingester";
pub const PANIC_GUIDE: &str = "https://dewey.ft.com/native-ingester.html";
