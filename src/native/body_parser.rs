//! Locates the content UUID inside a native body.

use crate::error::{IngesterError, Result};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Walks a dotted path (`post.uuid`, `items.0.id`) through a decoded JSON value.
/// Numeric segments index into arrays. Returns the leaf only when it is a string.
pub fn lookup_str<'a>(root: &'a Value, path: &str) -> Option<&'a str> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    current.as_str()
}

fn lookup_in_object<'a>(body: &'a Map<String, Value>, path: &str) -> Option<&'a str> {
    match path.split_once('.') {
        Some((head, rest)) => lookup_str(body.get(head)?, rest),
        None => body.get(path)?.as_str(),
    }
}

#[derive(Debug, Clone)]
pub struct ContentBodyParser {
    uuid_paths: Vec<String>,
}

impl ContentBodyParser {
    pub fn new<I, S>(uuid_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuid_paths: uuid_paths
                .into_iter()
                .map(|p| {
                    let p: String = p.into();
                    p.trim().to_string()
                })
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Probes the configured paths in order; the first string that parses as a UUID wins.
    pub fn get_uuid(&self, body: &Map<String, Value>) -> Result<String> {
        self.uuid_paths
            .iter()
            .filter_map(|path| lookup_in_object(body, path))
            .find(|candidate| Uuid::parse_str(candidate).is_ok())
            .map(str::to_string)
            .ok_or(IngesterError::UuidNotFound)
    }

    pub fn uuid_paths(&self) -> &[String] {
        &self.uuid_paths
    }
}
