use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use tradepost_backend::config::Config;
use tradepost_backend::external::feed_repo::FeedRepo;
use tradepost_backend::logging::{init_logging, LoggingConfig};
use tradepost_backend::services::backfill_service::{self, BackfillOptions};
use tradepost_backend::services::rate_limiter::RequestPacer;
use tradepost_backend::services::snapshot_store::AppendDestination;

/// Rebuild price history from the feed file's commit history, one
/// snapshot per calendar day.
#[derive(Parser)]
#[command(version, about = "Trading-post price history backfill")]
struct Cli {
    /// Earliest commit instant to consider, RFC 3339
    /// (e.g. 2025-06-01T00:00:00Z).
    #[arg(long)]
    since: String,
    /// Optional latest commit instant, RFC 3339.
    #[arg(long)]
    until: Option<String>,
    /// Write day-partitioned snapshot files instead of the flat history file.
    #[arg(long)]
    daily: bool,
    /// Delete an existing flat history file before writing.
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow::anyhow!("{e}"))?;

    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let since = parse_instant(&cli.since).context("Invalid --since")?;
    let until = cli
        .until
        .as_deref()
        .map(parse_instant)
        .transpose()
        .context("Invalid --until")?;

    let destination = if cli.daily {
        AppendDestination::Daily(config.data_dir.clone())
    } else {
        AppendDestination::FlatFile(config.history_file.clone())
    };
    let options = BackfillOptions {
        since,
        until,
        destination,
        fresh: cli.fresh,
    };

    let repo = FeedRepo::new(&config)?;
    let pacer = RequestPacer::new(config.backfill_fetch_delay);
    let summary = backfill_service::run(&repo, &pacer, &options).await?;

    tracing::info!(
        "Backfill done: {} revisions seen, {} days picked, {} rows appended, {} skipped",
        summary.revisions_seen,
        summary.days_picked,
        summary.rows_appended,
        summary.revisions_skipped
    );
    Ok(())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{}' is not an RFC 3339 instant", raw))
}
