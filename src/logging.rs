use std::fs;
use std::path::PathBuf;

use tracing::{info_span, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where and how verbosely to log
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: PathBuf,
    pub file_name: String,
}

impl LoggingConfig {
    pub fn new(level: &str) -> Self {
        Self {
            level: level.to_string(),
            directory: PathBuf::from("logs"),
            file_name: "pipeline.log".to_string(),
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> String {
        format!("{}={},warn", env!("CARGO_CRATE_NAME"), self.level)
    }
}

/// Keeps the file writer alive; logs are flushed when it is dropped.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initializes the logging system with both console and file output.
///
/// The console gets a human-readable layer with target, file and line; the
/// file under the configured directory gets daily-rolled JSON lines. A second
/// call keeps the subscriber from the first.
pub fn init_logging(config: &LoggingConfig) -> LoggingGuard {
    let _ = fs::create_dir_all(&config.directory);

    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_name);
    let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stdout);

    // Respect RUST_LOG if set; otherwise use the configured level for our crate
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Root span for one pipeline run; every component opens its own child span.
pub fn run_span(run_id: &str, schema: &str) -> Span {
    info_span!("pipeline_run", run_id, schema)
}
