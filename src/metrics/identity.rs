//! Identity Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Identity Resolver
pub struct IdentityMetrics;

impl IdentityMetrics {
    pub fn record_ids_minted(from_reference: usize, from_phone: usize) {
        ::metrics::counter!(phase_metric!(counter, "identity", "reference_ids_minted")).increment(from_reference as u64);
        ::metrics::counter!(phase_metric!(counter, "identity", "phone_ids_minted")).increment(from_phone as u64);
    }

    pub fn record_customers_dropped(unresolved: usize, duplicates: usize) {
        ::metrics::counter!(phase_metric!(counter, "identity", "unresolved_customers_dropped")).increment(unresolved as u64);
        ::metrics::counter!(phase_metric!(counter, "identity", "duplicate_customers_dropped")).increment(duplicates as u64);
    }

    pub fn record_orphan_complaints_dropped(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "identity", "orphan_complaints_dropped")).increment(count as u64);
    }
}

impl PhaseMetrics for IdentityMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "identity", "reference_ids_minted"));
        let _ = counter!(phase_metric!(counter, "identity", "phone_ids_minted"));
        let _ = counter!(phase_metric!(counter, "identity", "unresolved_customers_dropped"));
        let _ = counter!(phase_metric!(counter, "identity", "duplicate_customers_dropped"));
        let _ = counter!(phase_metric!(counter, "identity", "orphan_complaints_dropped"));
    }

    fn phase_name() -> &'static str {
        "identity"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "identity", "reference_ids_minted"),
                metric_type: MetricType::Counter,
                help: "Synthetic identifiers minted for external profile references",
            },
            MetricDoc {
                name: phase_metric!(counter, "identity", "phone_ids_minted"),
                metric_type: MetricType::Counter,
                help: "Fallback identifiers minted from phone numbers",
            },
            MetricDoc {
                name: phase_metric!(counter, "identity", "unresolved_customers_dropped"),
                metric_type: MetricType::Counter,
                help: "Customer rows dropped for lacking any identifying signal",
            },
            MetricDoc {
                name: phase_metric!(counter, "identity", "duplicate_customers_dropped"),
                metric_type: MetricType::Counter,
                help: "Customer rows dropped as duplicates of an earlier identifier",
            },
            MetricDoc {
                name: phase_metric!(counter, "identity", "orphan_complaints_dropped"),
                metric_type: MetricType::Counter,
                help: "Complaints dropped because their customer did not survive",
            },
        ]
    }
}
