//! Messages flowing through the ingester.

use crate::constants::{
    FIELD_LAST_MODIFIED, FIELD_PUBLISH_REFERENCE, HEADER_CONTENT_TYPE, HEADER_MESSAGE_TIMESTAMP,
    HEADER_MESSAGE_TYPE, HEADER_NATIVE_HASH, HEADER_ORIGIN_SYSTEM_ID, HEADER_REQUEST_ID,
    HEADER_X_NATIVE_HASH,
};
use crate::error::{IngesterError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// A message as read from, or written to, the queue proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Message {
    pub fn new(headers: HashMap<String, String>, body: impl Into<String>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Exact key first, then a case-insensitive scan.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str).or_else(|| {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn transaction_id(&self) -> &str {
        self.header(HEADER_REQUEST_ID).unwrap_or_default()
    }

    pub fn origin_system_id(&self) -> &str {
        self.header(HEADER_ORIGIN_SYSTEM_ID)
            .map(str::trim)
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(HEADER_CONTENT_TYPE)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.header(HEADER_MESSAGE_TYPE)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.header(HEADER_MESSAGE_TIMESTAMP)
    }

    pub fn native_hash(&self) -> Option<&str> {
        self.header(HEADER_NATIVE_HASH)
    }
}

/// The write request sent to the native store: the decoded body, stamped
/// with ingestion metadata, and the headers forwarded with it.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeMessage {
    body: Map<String, Value>,
    headers: BTreeMap<String, String>,
    partial: bool,
}

impl NativeMessage {
    pub fn new(content_body: &str, timestamp: &str, transaction_id: &str) -> Result<Self> {
        let mut body: Map<String, Value> =
            serde_json::from_str(content_body).map_err(IngesterError::InvalidBody)?;
        body.insert(
            FIELD_LAST_MODIFIED.to_string(),
            Value::String(timestamp.to_string()),
        );
        body.insert(
            FIELD_PUBLISH_REFERENCE.to_string(),
            Value::String(transaction_id.to_string()),
        );

        let mut headers = BTreeMap::new();
        headers.insert(HEADER_REQUEST_ID.to_string(), transaction_id.to_string());

        Ok(Self {
            body,
            headers,
            partial: false,
        })
    }

    pub fn add_hash_header(&mut self, hash: &str) {
        self.headers
            .insert(HEADER_X_NATIVE_HASH.to_string(), hash.to_string());
    }

    pub fn add_content_type_header(&mut self, content_type: &str) {
        self.headers
            .insert(HEADER_CONTENT_TYPE.to_string(), content_type.to_string());
    }

    pub fn add_origin_system_id_header(&mut self, origin: &str) {
        self.headers
            .insert(HEADER_ORIGIN_SYSTEM_ID.to_string(), origin.to_string());
    }

    /// Partial publications update rather than replace the stored document.
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn transaction_id(&self) -> &str {
        self.headers
            .get(HEADER_REQUEST_ID)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(HEADER_CONTENT_TYPE).map(String::as_str)
    }
}

/// Session handle issued by the queue proxy. Owned by exactly one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerInstance {
    /// Proxy address the instance was created on.
    pub address: String,
    pub base_uri: String,
    pub instance_id: String,
}
