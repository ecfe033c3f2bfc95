use tokio::net::TcpListener;

use tradepost_backend::app::create_app;
use tradepost_backend::config::Config;
use tradepost_backend::logging::{init_logging, LoggingConfig};
use tradepost_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = Config::from_env();
    config.validate()?;
    tracing::info!("Snapshot source: {}", config.snapshot_source.describe());
    tracing::info!(
        "Dataset cache TTL: {}s, default lookback: {} days",
        config.cache_ttl_secs,
        config.default_lookback_days
    );

    let addr = config.bind_addr;
    let state = AppState::new(config);
    let app = create_app(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🚀 Server running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
