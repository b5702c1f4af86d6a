use crate::constants::{
    DEFAULT_BACKOFF_SECONDS, DEFAULT_NO_OF_PROCESSORS, DEFAULT_OFFSET, DEFAULT_STREAM_COUNT,
};
use crate::error::{IngesterError, Result};
use std::str::FromStr;
use std::time::Duration;

/// What a stream does when committing offsets fails.
///
/// The proxy cannot tell "commit applied, response lost" apart from "commit
/// not applied", so neither choice is safe in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitFailurePolicy {
    /// Destroy the instance and back off. The next instance resumes from the
    /// last offset the proxy recorded, which may redeliver the batch.
    #[default]
    Reconnect,
    /// Log and keep the instance.
    BestEffort,
}

impl FromStr for CommitFailurePolicy {
    type Err = IngesterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reconnect" => Ok(Self::Reconnect),
            "best-effort" | "best_effort" | "besteffort" => Ok(Self::BestEffort),
            other => Err(IngesterError::Config(format!(
                "unknown commit failure policy '{other}', expected 'reconnect' or 'best-effort'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub addresses: Vec<String>,
    pub group: String,
    pub topic: String,
    /// Host header override used when the proxy sits behind a router.
    pub queue: Option<String>,
    pub offset: String,
    pub stream_count: usize,
    pub concurrent_processing: bool,
    pub no_of_processors: usize,
    pub auto_commit_enable: bool,
    pub backoff_period: Duration,
    pub authorization_key: Option<String>,
    pub commit_failure_policy: CommitFailurePolicy,
}

impl QueueConfig {
    pub fn new(addresses: Vec<String>, group: &str, topic: &str) -> Self {
        Self {
            addresses: addresses
                .into_iter()
                .map(|a| a.trim().trim_end_matches('/').to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            group: group.to_string(),
            topic: topic.to_string(),
            queue: None,
            offset: DEFAULT_OFFSET.to_string(),
            stream_count: DEFAULT_STREAM_COUNT,
            concurrent_processing: false,
            no_of_processors: DEFAULT_NO_OF_PROCESSORS,
            auto_commit_enable: false,
            backoff_period: Duration::from_secs(DEFAULT_BACKOFF_SECONDS),
            authorization_key: None,
            commit_failure_policy: CommitFailurePolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.addresses.is_empty() {
            return Err(IngesterError::Config(
                "at least one queue proxy address is required".into(),
            ));
        }
        if self.group.trim().is_empty() {
            return Err(IngesterError::Config("consumer group is required".into()));
        }
        if self.topic.trim().is_empty() {
            return Err(IngesterError::Config("topic is required".into()));
        }
        if self.stream_count == 0 {
            return Err(IngesterError::Config(
                "stream count must be at least 1".into(),
            ));
        }
        if self.concurrent_processing && self.no_of_processors == 0 {
            return Err(IngesterError::Config(
                "number of processors must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
