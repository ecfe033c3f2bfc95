use std::sync::Arc;

use crate::config::Config;
use crate::services::dataset_cache::DatasetCache;

/// Shared application state for the dashboard API.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dataset_cache: DatasetCache,
    /// Client used to fetch remote snapshot files.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            dataset_cache: DatasetCache::new(config.cache_ttl_secs),
            config: Arc::new(config),
            http,
        }
    }
}
