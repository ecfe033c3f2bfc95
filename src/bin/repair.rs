use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use tradepost_backend::config::Config;
use tradepost_backend::logging::{init_logging, LoggingConfig};
use tradepost_backend::services::repair_service;

/// Drop malformed rows from a history CSV and rewrite it fully quoted.
#[derive(Parser)]
#[command(version, about = "Trading-post history CSV repair")]
struct Cli {
    /// File to repair. Defaults to the configured history file.
    source: Option<PathBuf>,
    /// Where to write the repaired copy. Defaults to `<source>_clean.csv`.
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow::anyhow!("{e}"))?;

    let cli = Cli::parse();
    let config = Config::from_env();

    let source = cli.source.unwrap_or(config.history_file);
    let output = cli
        .output
        .unwrap_or_else(|| repair_service::default_output_path(&source));

    let report = repair_service::repair_file(&source, &output)?;
    tracing::info!(
        "Repair done: kept {}/{} rows ({} dropped) -> {}",
        report.kept_rows,
        report.total_rows,
        report.dropped_rows,
        output.display()
    );
    Ok(())
}
