//! Ingest Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for source ingestion
pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_sheet_loaded(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "sheets_loaded")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "ingest", "rows_loaded")).increment(rows as u64);
    }

    pub fn record_sheet_excluded() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "sheets_excluded")).increment(1);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "ingest", "sheets_loaded"));
        let _ = counter!(phase_metric!(counter, "ingest", "rows_loaded"));
        let _ = counter!(phase_metric!(counter, "ingest", "sheets_excluded"));
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "sheets_loaded"),
                metric_type: MetricType::Counter,
                help: "Sheets read from the source workbook",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rows_loaded"),
                metric_type: MetricType::Counter,
                help: "Rows read from the source across all sheets",
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "sheets_excluded"),
                metric_type: MetricType::Counter,
                help: "Sheets skipped because they are on the exclusion list",
            },
        ]
    }
}
