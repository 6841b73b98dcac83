// Reconciliation pipeline: ingestion, processing stages and the orchestrator

pub mod ingestion;
pub mod orchestrator;
pub mod processing;

pub use orchestrator::{CleanReport, IntegrationReport, Pipeline, RunReport};
