//! Health and good-to-go aggregation over the connectivity probes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::warn;

use crate::app::ports::ConnectivityCheckPort;
use crate::constants::{PANIC_GUIDE, SYSTEM_CODE};

/// A named probe plus the descriptive fields reported alongside it.
#[derive(Clone)]
pub struct Check {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: u8,
    pub business_impact: &'static str,
    pub technical_summary: &'static str,
    pub panic_guide: &'static str,
    pub checker: Arc<dyn ConnectivityCheckPort>,
}

impl Check {
    pub fn consumer_queue(checker: Arc<dyn ConnectivityCheckPort>) -> Self {
        Self {
            id: "consumer-queue",
            name: "ConsumerQueueReachable",
            severity: 2,
            business_impact: "Native content or metadata will not reach this app, nor will they be stored in native store",
            technical_summary: "Consumer message queue is not reachable/healthy",
            panic_guide: PANIC_GUIDE,
            checker,
        }
    }

    pub fn native_writer(checker: Arc<dyn ConnectivityCheckPort>) -> Self {
        Self {
            id: "native-writer",
            name: "NativeWriterReachable",
            severity: 2,
            business_impact: "Content or metadata will not be written in the native store nor will they reach the end of the publishing pipeline",
            technical_summary: "Native writer is not reachable/healthy",
            panic_guide: PANIC_GUIDE,
            checker,
        }
    }

    pub fn producer_queue(checker: Arc<dyn ConnectivityCheckPort>) -> Self {
        Self {
            id: "producer-queue",
            name: "ProducerQueueReachable",
            severity: 2,
            business_impact: "Content or metadata will not reach the end of the publishing pipeline",
            technical_summary: "Producer message queue is not reachable/healthy",
            panic_guide: PANIC_GUIDE,
            checker,
        }
    }

    async fn probe(&self, timeout: Duration) -> Result<String, String> {
        match tokio::time::timeout(timeout, self.checker.connectivity_check()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("{} timed out after {:?}", self.name, timeout)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub name: String,
    pub ok: bool,
    pub severity: u8,
    pub business_impact: String,
    pub technical_summary: String,
    pub panic_guide: String,
    pub check_output: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub schema_version: u8,
    pub system_code: String,
    pub name: String,
    pub description: String,
    pub checks: Vec<CheckResult>,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtgStatus {
    pub good_to_go: bool,
    pub message: String,
}

pub struct HealthService {
    checks: Vec<Check>,
    timeout: Duration,
}

impl HealthService {
    /// The producer check is only registered when forwarding is configured.
    pub fn new(
        consumer: Arc<dyn ConnectivityCheckPort>,
        writer: Arc<dyn ConnectivityCheckPort>,
        producer: Option<Arc<dyn ConnectivityCheckPort>>,
        timeout: Duration,
    ) -> Self {
        let mut checks = vec![Check::consumer_queue(consumer), Check::native_writer(writer)];
        if let Some(producer) = producer {
            checks.push(Check::producer_queue(producer));
        }
        Self::with_checks(checks, timeout)
    }

    pub fn with_checks(checks: Vec<Check>, timeout: Duration) -> Self {
        Self { checks, timeout }
    }

    /// Runs every check in parallel. Failures are reported per check, never as an error.
    pub async fn report(&self) -> HealthReport {
        let results = futures::future::join_all(self.checks.iter().map(|check| async move {
            let outcome = check.probe(self.timeout).await;
            if let Err(e) = &outcome {
                warn!(check = check.id, error = %e, "Health check failed");
            }
            let (ok, check_output) = match outcome {
                Ok(output) => (true, output),
                Err(e) => (false, e),
            };
            CheckResult {
                id: check.id.to_string(),
                name: check.name.to_string(),
                ok,
                severity: check.severity,
                business_impact: check.business_impact.to_string(),
                technical_summary: check.technical_summary.to_string(),
                panic_guide: check.panic_guide.to_string(),
                check_output,
                last_updated: Utc::now(),
            }
        }))
        .await;

        HealthReport {
            schema_version: 1,
            system_code: SYSTEM_CODE.to_string(),
            name: "Native Ingester Healthcheck".to_string(),
            description: "It checks if kafka and native writer are available".to_string(),
            ok: results.iter().all(|r| r.ok),
            checks: results,
        }
    }

    /// Runs the checks in parallel and returns as soon as one fails.
    pub async fn gtg(&self) -> GtgStatus {
        let mut pending: FuturesUnordered<_> = self
            .checks
            .iter()
            .map(|check| check.probe(self.timeout))
            .collect();

        while let Some(outcome) = pending.next().await {
            if let Err(message) = outcome {
                return GtgStatus {
                    good_to_go: false,
                    message,
                };
            }
        }
        GtgStatus {
            good_to_go: true,
            message: "OK".to_string(),
        }
    }
}
