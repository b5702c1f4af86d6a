//! Routing, native write and forwarding metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_ingested() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "ingested")).increment(1);
    }

    pub fn record_routing_skipped() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "routing_skipped")).increment(1);
    }

    pub fn record_parse_error() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "parse_errors")).increment(1);
    }

    pub fn record_write_error() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "write_errors")).increment(1);
    }

    pub fn record_write_duration(duration_secs: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "write_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_forwarded() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "forwarded")).increment(1);
    }

    pub fn record_forward_error() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "forward_errors")).increment(1);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        for doc in Self::metrics_documentation() {
            match doc.metric_type {
                MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
                MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
            }
        }
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "ingested"),
                metric_type: MetricType::Counter,
                help: "Messages written to the native store and forwarded when configured",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "routing_skipped"),
                metric_type: MetricType::Counter,
                help: "Messages skipped because origin or content type is not configured",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "parse_errors"),
                metric_type: MetricType::Counter,
                help: "Messages dropped for a missing timestamp, invalid body or missing UUID",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "write_errors"),
                metric_type: MetricType::Counter,
                help: "Failed writes to the native store",
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "write_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of native store writes in seconds",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "forwarded"),
                metric_type: MetricType::Counter,
                help: "Messages forwarded to the downstream queue",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "forward_errors"),
                metric_type: MetricType::Counter,
                help: "Failed forwards to the downstream queue",
            },
        ]
    }
}
