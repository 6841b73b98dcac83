//! Centralized metrics for the reconciliation pipeline
//!
//! Each pipeline phase defines its own metrics in a dedicated submodule so that
//! ownership stays clear and names never collide. Counters go through the
//! `metrics` facade; no exporter is installed here, a host process may install
//! one before running the pipeline.

pub mod core;
pub mod identity;
pub mod ingest;
pub mod integrity;
pub mod normalize;
pub mod registry;
pub mod tat;

pub use identity::IdentityMetrics;
pub use ingest::IngestMetrics;
pub use integrity::IntegrityMetrics;
pub use normalize::NormalizeMetrics;
pub use tat::TatMetrics;

pub use registry::register_all_metrics;

/// Trait for phase-specific metrics collections
///
/// Each pipeline phase implements this trait to provide:
/// - Metric registration at startup
/// - Consistent naming conventions
/// - Documentation of what each metric measures
pub trait PhaseMetrics {
    /// Register all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Macro to create phase-specific metric names with consistent naming
///
/// This ensures all metrics follow the naming convention:
/// cs_{phase}_{metric_name}_{type}
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("cs_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("cs_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("cs_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
