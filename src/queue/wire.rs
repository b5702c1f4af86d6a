//! Message framing used by the queue proxy.
//!
//! Records travel as base64 values inside a JSON envelope. A decoded value is
//! an FTMSG frame: a version line, `Key: Value` header lines, a blank line and
//! the body.

use crate::constants::FTMSG_VERSION_LINE;
use crate::domain::Message;
use crate::error::{IngesterError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CRLF: &str = "\r\n";

#[derive(Debug, Deserialize)]
pub struct ConsumedRecord {
    pub value: String,
    #[serde(default)]
    pub partition: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProducedRecord {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ProduceRequest {
    pub records: Vec<ProducedRecord>,
}

/// Renders a message as an FTMSG frame with headers sorted by name.
pub fn encode_frame(msg: &Message) -> String {
    let mut names: Vec<&String> = msg.headers.keys().collect();
    names.sort();

    let mut frame = String::with_capacity(msg.body.len() + 64 * names.len());
    frame.push_str(FTMSG_VERSION_LINE);
    frame.push_str(CRLF);
    for name in names {
        frame.push_str(name);
        frame.push_str(": ");
        frame.push_str(&msg.headers[name]);
        frame.push_str(CRLF);
    }
    frame.push_str(CRLF);
    frame.push_str(&msg.body);
    frame
}

pub fn decode_frame(frame: &str) -> Result<Message> {
    // Split at whichever blank-line terminator comes first; the body may
    // contain the other one.
    let (head, body) = ["\r\n\r\n", "\n\n"]
        .iter()
        .filter_map(|sep| frame.find(sep).map(|at| (at, sep.len())))
        .min_by_key(|(at, _)| *at)
        .map(|(at, len)| (&frame[..at], &frame[at + len..]))
        .ok_or_else(|| IngesterError::Wire {
            message: "frame has no header terminator".into(),
        })?;

    let mut lines = head.lines();
    match lines.next().map(str::trim) {
        Some(version) if version.starts_with("FTMSG/") => {}
        other => {
            return Err(IngesterError::Wire {
                message: format!("unexpected frame version line: {:?}", other.unwrap_or("")),
            })
        }
    }

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect::<HashMap<_, _>>();

    Ok(Message::new(headers, body))
}

pub fn decode_record(record: &ConsumedRecord) -> Result<Message> {
    let bytes = STANDARD
        .decode(record.value.as_bytes())
        .map_err(|e| IngesterError::Wire {
            message: format!("record value is not base64: {e}"),
        })?;
    let frame = String::from_utf8(bytes).map_err(|e| IngesterError::Wire {
        message: format!("record value is not UTF-8: {e}"),
    })?;
    decode_frame(&frame)
}

/// Wraps one message in the proxy's binary produce envelope.
pub fn produce_request(key: &str, msg: &Message) -> ProduceRequest {
    let key = if key.is_empty() {
        String::new()
    } else {
        STANDARD.encode(key)
    };
    ProduceRequest {
        records: vec![ProducedRecord {
            key,
            value: STANDARD.encode(encode_frame(msg)),
        }],
    }
}
