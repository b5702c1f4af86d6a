//! Prometheus metrics for the ingester
//!
//! Each stage of the pipeline owns its metric names in a dedicated submodule,
//! keeping naming consistent and conflicts visible at startup.

pub mod consumer;
pub mod ingest;
pub mod registry;

pub use consumer::ConsumerMetrics;
pub use ingest::IngestMetrics;

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Initialize the global metrics recorder
///
/// Idempotent. When `listen_addr` is given an HTTP exporter serves `/metrics`
/// on it; otherwise metrics are recorded in-process only.
pub fn init_metrics(listen_addr: Option<SocketAddr>) {
    INIT.call_once(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

        let installed = match listen_addr {
            Some(addr) => builder.with_http_listener(addr).install().map(|_| {
                info!("Prometheus HTTP exporter started at http://{}/metrics", addr);
            }),
            None => builder.install_recorder().map(|_| {
                info!("Prometheus recorder installed without HTTP exporter");
            }),
        };

        match installed {
            Ok(()) => {
                registry::register_all_metrics();
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Trait for stage-specific metrics collections
pub trait PhaseMetrics {
    /// Describe every metric of this stage to the recorder
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Builds metric names of the form native_ingester_{phase}_{name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("native_ingester_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("native_ingester_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
