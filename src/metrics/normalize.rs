//! Normalize Phase Metrics
//!
//! Field-level transform activity: rows seen, sentinel substitutions, region
//! matches and duplicate rows removed.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Field Normalizer
pub struct NormalizeMetrics;

impl NormalizeMetrics {
    pub fn record_rows_processed(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "rows_processed")).increment(rows as u64);
    }

    /// A field transform could not interpret its input and fell back to its sentinel
    pub fn record_transform_failures(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "transform_failures")).increment(count as u64);
    }

    pub fn record_regions_unmatched(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "regions_unmatched")).increment(count as u64);
    }

    pub fn record_duplicates_removed(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "duplicates_removed")).increment(count as u64);
    }

    pub fn record_duration(duration_secs: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "normalize", "duration_seconds")).record(duration_secs);
    }
}

impl PhaseMetrics for NormalizeMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "normalize", "rows_processed"));
        let _ = counter!(phase_metric!(counter, "normalize", "transform_failures"));
        let _ = counter!(phase_metric!(counter, "normalize", "regions_unmatched"));
        let _ = counter!(phase_metric!(counter, "normalize", "duplicates_removed"));
        let _ = histogram!(phase_metric!(histogram, "normalize", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "normalize"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "normalize", "rows_processed"),
                metric_type: MetricType::Counter,
                help: "Rows passed through the field normalizer",
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "transform_failures"),
                metric_type: MetricType::Counter,
                help: "Field values replaced by a sentinel because they could not be interpreted",
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "regions_unmatched"),
                metric_type: MetricType::Counter,
                help: "Non-empty region values scoring below the match threshold",
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "duplicates_removed"),
                metric_type: MetricType::Counter,
                help: "Exact duplicate rows removed after normalization",
            },
            MetricDoc {
                name: phase_metric!(histogram, "normalize", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of a normalization pass in seconds",
            },
        ]
    }
}
