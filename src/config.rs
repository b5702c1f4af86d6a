//! Origin routing configuration.
//!
//! Maps an origin system to an ordered list of content-type rules. The first
//! rule whose pattern matches the message content type names the collection
//! the content is written to.

use crate::error::{IngesterError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    collection: String,
}

/// A content-type pattern paired with its destination collection.
#[derive(Debug, Clone)]
pub struct OriginRule {
    pattern: Regex,
    collection: String,
}

impl OriginRule {
    pub fn new(content_type: &str, collection: &str) -> Result<Self> {
        if content_type.is_empty() {
            return Err(IngesterError::Config("content_type value is mandatory".into()));
        }
        if collection.is_empty() {
            return Err(IngesterError::Config("collection value is mandatory".into()));
        }
        let pattern = Regex::new(content_type).map_err(|source| IngesterError::InvalidPattern {
            pattern: content_type.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            collection: collection.to_string(),
        })
    }

    pub fn matches(&self, content_type: &str) -> bool {
        self.pattern.is_match(content_type)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Read-only after load; shared by reference between the writer and the handler.
#[derive(Debug, Clone, Default)]
pub struct CollectionsConfig {
    origins: HashMap<String, Vec<OriginRule>>,
}

impl CollectionsConfig {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: HashMap<String, Vec<RawRule>> =
            serde_json::from_reader(reader).map_err(IngesterError::ConfigJson)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_reader(json.as_bytes())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            IngesterError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    fn from_raw(raw: HashMap<String, Vec<RawRule>>) -> Result<Self> {
        let mut origins = HashMap::with_capacity(raw.len());
        for (origin, rules) in raw {
            let compiled = rules
                .iter()
                .map(|r| OriginRule::new(&r.content_type, &r.collection))
                .collect::<Result<Vec<_>>>()?;
            origins.insert(origin, compiled);
        }
        Ok(Self { origins })
    }

    /// Builder used by tests and embedders that construct routing in code.
    pub fn with_origin(mut self, origin: &str, rules: Vec<OriginRule>) -> Self {
        self.origins.insert(origin.to_string(), rules);
        self
    }

    pub fn get_collection(&self, origin_id: &str, content_type: &str) -> Result<String> {
        let rules = self
            .origins
            .get(origin_id)
            .filter(|rules| !rules.is_empty())
            .ok_or_else(|| IngesterError::OriginNotFound {
                origin: origin_id.to_string(),
            })?;

        rules
            .iter()
            .find(|rule| rule.matches(content_type))
            .map(|rule| rule.collection.clone())
            .ok_or_else(|| IngesterError::NoRuleMatched {
                origin: origin_id.to_string(),
                content_type: content_type.to_string(),
            })
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }
}
