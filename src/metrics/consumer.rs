//! Queue consumption metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ConsumerMetrics;

impl ConsumerMetrics {
    pub fn record_poll(messages: usize) {
        ::metrics::counter!(phase_metric!(counter, "consumer", "polls")).increment(1);
        if messages == 0 {
            ::metrics::counter!(phase_metric!(counter, "consumer", "empty_polls")).increment(1);
        } else {
            ::metrics::counter!(phase_metric!(counter, "consumer", "messages_received"))
                .increment(messages as u64);
        }
    }

    pub fn record_poll_error() {
        ::metrics::counter!(phase_metric!(counter, "consumer", "poll_errors")).increment(1);
    }

    pub fn record_commit_error() {
        ::metrics::counter!(phase_metric!(counter, "consumer", "commit_errors")).increment(1);
    }

    pub fn record_instance_created() {
        ::metrics::counter!(phase_metric!(counter, "consumer", "instances_created")).increment(1);
    }

    pub fn record_instance_destroyed() {
        ::metrics::counter!(phase_metric!(counter, "consumer", "instances_destroyed")).increment(1);
    }

    pub fn record_handler_panic() {
        ::metrics::counter!(phase_metric!(counter, "consumer", "handler_panics")).increment(1);
    }
}

impl PhaseMetrics for ConsumerMetrics {
    fn register_metrics() {
        for doc in Self::metrics_documentation() {
            ::metrics::describe_counter!(doc.name, doc.help);
        }
    }

    fn phase_name() -> &'static str {
        "consumer"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "consumer", "polls"),
                metric_type: MetricType::Counter,
                help: "Consume calls that returned successfully",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "empty_polls"),
                metric_type: MetricType::Counter,
                help: "Consume calls that returned no messages",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "messages_received"),
                metric_type: MetricType::Counter,
                help: "Messages received from the queue proxy",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "poll_errors"),
                metric_type: MetricType::Counter,
                help: "Failed create or consume calls against the queue proxy",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "commit_errors"),
                metric_type: MetricType::Counter,
                help: "Failed offset commits",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "instances_created"),
                metric_type: MetricType::Counter,
                help: "Consumer instances created on the queue proxy",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "instances_destroyed"),
                metric_type: MetricType::Counter,
                help: "Consumer instances destroyed on the queue proxy",
            },
            MetricDoc {
                name: phase_metric!(counter, "consumer", "handler_panics"),
                metric_type: MetricType::Counter,
                help: "Message handler invocations that panicked",
            },
        ]
    }
}
