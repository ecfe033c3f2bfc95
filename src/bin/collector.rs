use anyhow::Result;
use clap::Parser;

use tradepost_backend::config::Config;
use tradepost_backend::external::price_feed::JsonPriceFeed;
use tradepost_backend::logging::{init_logging, LoggingConfig};
use tradepost_backend::services::ingest_service;
use tradepost_backend::services::snapshot_store::AppendDestination;

/// Fetch the current price feed once and append it to the snapshot store.
#[derive(Parser)]
#[command(version, about = "Trading-post price collector")]
struct Cli {
    /// Append to the single legacy history file instead of daily snapshots.
    #[arg(long)]
    flat: bool,
    /// Skip the network and seed DAYS days of random-walk demo snapshots.
    #[arg(long, value_name = "DAYS")]
    mock: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow::anyhow!("{e}"))?;

    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    if let Some(days) = cli.mock {
        let files = ingest_service::seed_mock(&config.data_dir, days)?;
        tracing::info!("Done: {} mock snapshot files written", files);
        return Ok(());
    }

    let destination = if cli.flat {
        AppendDestination::FlatFile(config.history_file.clone())
    } else {
        AppendDestination::Daily(config.data_dir.clone())
    };

    let feed = JsonPriceFeed::new(config.feed_url.clone(), config.request_timeout)?;
    let outcome = ingest_service::collect_once(&feed, &destination).await?;
    tracing::info!(
        "Done: {} rows appended, {} dropped",
        outcome.rows_appended,
        outcome.rows_dropped
    );
    Ok(())
}
