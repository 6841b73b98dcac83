//! TAT Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the TAT Reconciler
pub struct TatMetrics;

impl TatMetrics {
    pub fn record_dates_swapped(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "tat", "dates_swapped")).increment(count as u64);
    }

    pub fn record_recomputed(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "tat", "recomputed")).increment(count as u64);
    }

    /// Rows still negative or missing once every repair has run
    pub fn record_unrepaired(negative: usize, missing: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "tat", "negative_remaining")).set(negative as f64);
        ::metrics::gauge!(phase_metric!(gauge, "tat", "missing_remaining")).set(missing as f64);
    }
}

impl PhaseMetrics for TatMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge};

        let _ = counter!(phase_metric!(counter, "tat", "dates_swapped"));
        let _ = counter!(phase_metric!(counter, "tat", "recomputed"));
        let _ = gauge!(phase_metric!(gauge, "tat", "negative_remaining"));
        let _ = gauge!(phase_metric!(gauge, "tat", "missing_remaining"));
    }

    fn phase_name() -> &'static str {
        "tat"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "tat", "dates_swapped"),
                metric_type: MetricType::Counter,
                help: "Rows whose log and resolution dates were swapped back into order",
            },
            MetricDoc {
                name: phase_metric!(counter, "tat", "recomputed"),
                metric_type: MetricType::Counter,
                help: "Turnaround times recomputed from the date pair",
            },
            MetricDoc {
                name: phase_metric!(gauge, "tat", "negative_remaining"),
                metric_type: MetricType::Gauge,
                help: "Rows left with a negative turnaround time after repair",
            },
            MetricDoc {
                name: phase_metric!(gauge, "tat", "missing_remaining"),
                metric_type: MetricType::Gauge,
                help: "Rows left without a turnaround time after repair",
            },
        ]
    }
}
