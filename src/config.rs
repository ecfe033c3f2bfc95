use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::dataset_service::SnapshotSource;

/// Hard ceiling for the dashboard lookback window, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 90;

const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/orzice/DeltaForcePrice/master/price.json";
const DEFAULT_FEED_REPO: &str = "orzice/DeltaForcePrice";
const DEFAULT_FEED_PATH: &str = "price.json";

/// Runtime settings shared by the server and the ingestion binaries.
///
/// Everything comes from the environment (with `.env` support via `dotenvy`
/// in the binaries); bad numeric values silently fall back to defaults,
/// semantic problems are caught by [`Config::validate`].
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Directory holding the day-partitioned snapshot files.
    pub data_dir: PathBuf,
    /// Legacy single-file history (flat destination and repair default).
    pub history_file: PathBuf,
    /// Upstream JSON price feed.
    pub feed_url: String,
    /// `owner/repo` of the repository the feed file lives in (backfill).
    pub feed_repo: String,
    /// Path of the feed file inside the repository (backfill).
    pub feed_path: String,
    pub github_token: Option<String>,
    pub request_timeout: Duration,
    /// Where the dashboard loads daily snapshots from.
    pub snapshot_source: SnapshotSource,
    pub cache_ttl_secs: i64,
    pub default_lookback_days: u32,
    /// Politeness delay between revision-list page requests.
    pub backfill_page_delay: Duration,
    /// Politeness delay between revision content fetches.
    pub backfill_fetch_delay: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));

        let snapshot_source = match std::env::var("SNAPSHOT_SOURCE") {
            Ok(s) if s.starts_with("http://") || s.starts_with("https://") => {
                SnapshotSource::RemoteBase(s.trim_end_matches('/').to_string())
            }
            Ok(s) => SnapshotSource::LocalDir(PathBuf::from(s)),
            Err(_) => SnapshotSource::LocalDir(data_dir.clone()),
        };

        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000")
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000))),
            data_dir,
            history_file: PathBuf::from(env_or("HISTORY_FILE", "price_history.csv")),
            feed_url: env_or("PRICE_FEED_URL", DEFAULT_FEED_URL),
            feed_repo: env_or("FEED_REPO", DEFAULT_FEED_REPO),
            feed_path: env_or("FEED_PATH", DEFAULT_FEED_PATH),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout: Duration::from_secs(env_num("FEED_TIMEOUT_SECS", 30)),
            snapshot_source,
            cache_ttl_secs: env_num("DATASET_CACHE_TTL_SECS", 60) as i64,
            default_lookback_days: env_num("DEFAULT_LOOKBACK_DAYS", 30) as u32,
            backfill_page_delay: Duration::from_millis(env_num("BACKFILL_PAGE_DELAY_MS", 150)),
            backfill_fetch_delay: Duration::from_millis(env_num("BACKFILL_FETCH_DELAY_MS", 200)),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.feed_repo.contains('/') {
            return Err(format!(
                "FEED_REPO must be of the form owner/repo, got '{}'",
                self.feed_repo
            ));
        }
        if self.default_lookback_days == 0 || self.default_lookback_days > MAX_LOOKBACK_DAYS {
            return Err(format!(
                "DEFAULT_LOOKBACK_DAYS must be within 1..={}, got {}",
                MAX_LOOKBACK_DAYS, self.default_lookback_days
            ));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_num(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
