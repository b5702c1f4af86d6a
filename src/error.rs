use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngesterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid content type pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration JSON is malformed: {0}")]
    ConfigJson(#[source] serde_json::Error),

    #[error("origin system not found: {origin}")]
    OriginNotFound { origin: String },

    #[error("Origin system and content type not configured: origin={origin} content_type={content_type}")]
    NoRuleMatched { origin: String, content_type: String },

    #[error("UUID not found")]
    UuidNotFound,

    #[error("publish event does not contain timestamp")]
    MissingTimestamp,

    #[error("Message body is not a valid JSON object: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Native writer returned non-200 code: {status}")]
    WriteStatus { status: u16 },

    #[error("Native writer request failed: {0}")]
    WriteTransport(#[source] reqwest::Error),

    #[error("Queue proxy error: {message}")]
    Queue { message: String },

    #[error("Queue proxy returned status {status}, expected {expected}")]
    QueueStatus { status: u16, expected: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Forwarding failed: {message}")]
    Forward { message: String },

    #[error("{message}")]
    Connectivity { message: String },

    #[error("Malformed queue message: {message}")]
    Wire { message: String },

    #[error("HTTP server error: {0}")]
    Server(#[from] hyper::Error),
}

impl IngesterError {
    /// Content outside the routing whitelist. Dropped on purpose, not a fault.
    pub fn is_routing_skip(&self) -> bool {
        matches!(
            self,
            IngesterError::OriginNotFound { .. } | IngesterError::NoRuleMatched { .. }
        )
    }

    /// Per-message errors caused by the payload itself.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            IngesterError::UuidNotFound
                | IngesterError::MissingTimestamp
                | IngesterError::InvalidBody(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IngesterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_errors_are_skips() {
        let not_found = IngesterError::OriginNotFound {
            origin: "x".into(),
        };
        let no_rule = IngesterError::NoRuleMatched {
            origin: "x".into(),
            content_type: "text/plain".into(),
        };
        assert!(not_found.is_routing_skip());
        assert!(no_rule.is_routing_skip());
        assert!(!IngesterError::UuidNotFound.is_routing_skip());
        assert!(!IngesterError::WriteStatus { status: 500 }.is_routing_skip());
    }

    #[test]
    fn parse_errors_are_classified() {
        assert!(IngesterError::MissingTimestamp.is_parse_error());
        assert!(IngesterError::UuidNotFound.is_parse_error());
        assert!(!IngesterError::Config("x".into()).is_parse_error());
    }

    #[test]
    fn timestamp_message_matches_log_text() {
        assert_eq!(
            IngesterError::MissingTimestamp.to_string(),
            "publish event does not contain timestamp"
        );
    }
}
