use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema error: missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Integrity violation: {}", .violations.join("; "))]
    Integrity { violations: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A single field transform could not interpret its input.
///
/// Never fatal: the normalizer substitutes the transform's sentinel, counts
/// the failure against the column and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot interpret '{value}' as {expected}")]
pub struct TransformFailure {
    pub expected: &'static str,
    pub value: String,
}

impl TransformFailure {
    pub fn new(expected: &'static str, value: impl Into<String>) -> Self {
        Self {
            expected,
            value: value.into(),
        }
    }
}
