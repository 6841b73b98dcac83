//! Metrics registry for coordinating phase-specific metrics
//!
//! Registers every phase's metrics and detects naming conflicts early.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases and return how many were registered
pub fn register_all_metrics() -> usize {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::ingest::IngestMetrics>(&mut all_metrics);
    register_phase_metrics::<super::normalize::NormalizeMetrics>(&mut all_metrics);
    register_phase_metrics::<super::tat::TatMetrics>(&mut all_metrics);
    register_phase_metrics::<super::identity::IdentityMetrics>(&mut all_metrics);
    register_phase_metrics::<super::integrity::IntegrityMetrics>(&mut all_metrics);

    info!("Registered {} total metrics across all phases", all_metrics.len());
    all_metrics.len()
}

/// Register metrics for a specific phase and detect conflicts
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, MetricDoc>) {
    T::register_metrics();
    let phase_docs = T::metrics_documentation();
    let phase_name = T::phase_name();

    debug!("Registering {} metrics for phase '{}'", phase_docs.len(), phase_name);

    for doc in phase_docs {
        if extract_phase_from_metric_name(doc.name) != phase_name {
            warn!("Metric '{}' does not carry its phase prefix '{}'", doc.name, phase_name);
        }
        if all_metrics.contains_key(doc.name) {
            warn!("Metric name conflict detected: '{}' (phase '{}')", doc.name, phase_name);
        } else {
            all_metrics.insert(doc.name.to_string(), doc);
        }
    }
}

/// Extract phase name from metric name (e.g., "cs_tat_recomputed_total" -> "tat")
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("cs_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(extract_phase_from_metric_name("cs_tat_recomputed_total"), "tat");
        assert_eq!(extract_phase_from_metric_name("cs_normalize_duration_seconds"), "normalize");
        assert_eq!(extract_phase_from_metric_name("invalid_metric_name"), "unknown");
    }

    #[test]
    fn test_register_all_metrics_has_no_conflicts() {
        let expected = super::super::IngestMetrics::metrics_documentation().len()
            + super::super::NormalizeMetrics::metrics_documentation().len()
            + super::super::TatMetrics::metrics_documentation().len()
            + super::super::IdentityMetrics::metrics_documentation().len()
            + super::super::IntegrityMetrics::metrics_documentation().len();

        assert_eq!(register_all_metrics(), expected);
    }
}
