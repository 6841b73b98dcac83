//! Integrity Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Integrity Enforcer
pub struct IntegrityMetrics;

impl IntegrityMetrics {
    pub fn record_values_filled(names: usize, log_dates: usize, customer_ids: usize) {
        ::metrics::counter!(phase_metric!(counter, "integrity", "names_filled")).increment(names as u64);
        ::metrics::counter!(phase_metric!(counter, "integrity", "log_dates_filled")).increment(log_dates as u64);
        ::metrics::counter!(phase_metric!(counter, "integrity", "customer_ids_filled")).increment(customer_ids as u64);
    }

    pub fn record_rows_removed(customers: usize, complaints: usize) {
        ::metrics::counter!(phase_metric!(counter, "integrity", "customers_removed")).increment(customers as u64);
        ::metrics::counter!(phase_metric!(counter, "integrity", "complaints_removed")).increment(complaints as u64);
    }

    pub fn record_violations(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "integrity", "violations")).increment(count as u64);
    }

    pub fn record_commit() {
        ::metrics::counter!(phase_metric!(counter, "integrity", "commits")).increment(1);
    }
}

impl PhaseMetrics for IntegrityMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "integrity", "names_filled"));
        let _ = counter!(phase_metric!(counter, "integrity", "log_dates_filled"));
        let _ = counter!(phase_metric!(counter, "integrity", "customer_ids_filled"));
        let _ = counter!(phase_metric!(counter, "integrity", "customers_removed"));
        let _ = counter!(phase_metric!(counter, "integrity", "complaints_removed"));
        let _ = counter!(phase_metric!(counter, "integrity", "violations"));
        let _ = counter!(phase_metric!(counter, "integrity", "commits"));
    }

    fn phase_name() -> &'static str {
        "integrity"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "integrity", "names_filled"),
                metric_type: MetricType::Counter,
                help: "Null customer names replaced by the default",
            },
            MetricDoc {
                name: phase_metric!(counter, "integrity", "log_dates_filled"),
                metric_type: MetricType::Counter,
                help: "Null complaint log dates replaced by the processing date",
            },
            MetricDoc {
                name: phase_metric!(counter, "integrity", "customer_ids_filled"),
                metric_type: MetricType::Counter,
                help: "Customers given a fallback identifier",
            },
            MetricDoc {
                name: phase_metric!(counter, "integrity", "customers_removed"),
                metric_type: MetricType::Counter,
                help: "Customers removed for lacking a phone number",
            },
            MetricDoc {
                name: phase_metric!(counter, "integrity", "complaints_removed"),
                metric_type: MetricType::Counter,
                help: "Complaints removed together with their customer",
            },
            MetricDoc {
                name: phase_metric!(counter, "integrity", "violations"),
                metric_type: MetricType::Counter,
                help: "Invariant violations found at verification",
            },
            MetricDoc {
                name: phase_metric!(counter, "integrity", "commits"),
                metric_type: MetricType::Counter,
                help: "Constrained commits completed",
            },
        ]
    }
}
