//! Long-lived HTTP client whose connection pool is periodically discarded.
//!
//! Backends behind the queue proxy and the native store are rotated by the
//! infrastructure; a pooled keep-alive connection can outlive the instance it
//! points at. Swapping in a fresh `reqwest::Client` drops every idle
//! connection so the next request resolves and connects again.

use crate::error::Result;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shortest accepted ageing period. `tokio::time::interval` rejects zero.
pub const MIN_AGEING_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_idle_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Clone)]
pub struct AgeingClient {
    inner: Arc<RwLock<reqwest::Client>>,
    settings: ClientSettings,
}

impl AgeingClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = build_client(&settings)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(client)),
            settings,
        })
    }

    /// Current client handle. Cheap: `reqwest::Client` is reference counted.
    pub fn client(&self) -> reqwest::Client {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the client, closing its idle connections once in-flight requests finish.
    pub fn refresh(&self) {
        match build_client(&self.settings) {
            Ok(fresh) => {
                *self
                    .inner
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = fresh;
                debug!("Closed idle HTTP connections");
            }
            Err(e) => warn!("Could not rebuild HTTP client, keeping the current one: {}", e),
        }
    }

    /// Refresh on a fixed period until the returned task is aborted.
    pub fn start_ageing_process(&self, max_age: Duration) -> JoinHandle<()> {
        let max_age = max_age.max(MIN_AGEING_PERIOD);
        info!("Starting HTTP client ageing every {:?}", max_age);
        let client = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(max_age);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                client.refresh();
            }
        })
    }
}

fn build_client(settings: &ClientSettings) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .pool_idle_timeout(settings.pool_idle_timeout)
        .build()?)
}
