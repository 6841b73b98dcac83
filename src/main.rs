use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use cs_pipeline::config::Config;
use cs_pipeline::logging::{init_logging, LoggingConfig};
use cs_pipeline::metrics::register_all_metrics;
use cs_pipeline::pipeline::{Pipeline, RunReport};
use cs_pipeline::storage::SqliteStore;

#[derive(Parser)]
#[command(name = "cs_pipeline")]
#[command(about = "Customer-support data reconciliation pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML configuration file; the environment (and `.env`) is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every phase from the source file to the constrained commit
    Run,
    /// Ingest, normalize and reconcile turnaround times; persist the raw snapshot
    Clean,
    /// Resolve identities and enforce integrity over the persisted raw snapshot
    Integrate,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env().context("reading config from the environment")?,
    };
    match &cli.log_level {
        Some(level) => Ok(config.with_log_level(level)?),
        None => Ok(config),
    }
}

fn print_report(report: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing run report")?;
    println!("{json}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let _log_guard = init_logging(&LoggingConfig::new(&config.log_level));
    let registered = register_all_metrics();
    info!(metrics = registered, "Metrics registered");

    let store = SqliteStore::open(&config.db_credentials.database)
        .with_context(|| format!("opening database {}", config.db_credentials.database.display()))?;
    let pipeline = Pipeline::new(config, store);

    let result = match cli.command {
        Commands::Run => pipeline.run(),
        Commands::Clean => pipeline.clean(),
        Commands::Integrate => pipeline.integrate(),
    };

    match result {
        Ok(report) => print_report(&report),
        Err(e) => {
            error!(error = %e, "Pipeline failed");
            Err(e).context("pipeline run failed")
        }
    }
}
