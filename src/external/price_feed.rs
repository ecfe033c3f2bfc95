use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// One raw feed entry. The upstream schema is loose, so entries stay as
/// JSON objects until normalization.
pub type RawEntry = Map<String, Value>;

/// A fetched batch of raw entries plus the instant it was fetched.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub entries: Vec<RawEntry>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Bad response: {0}")]
    BadResponse(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Source of current price batches. Implemented over HTTP in production and
/// by fixed fixtures in tests.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch(&self) -> Result<RawSnapshot, FeedError>;
}

/// Fetches the live feed: a single JSON array of price objects.
pub struct JsonPriceFeed {
    client: reqwest::Client,
    url: String,
}

impl JsonPriceFeed {
    pub fn new(url: String, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PriceFeed for JsonPriceFeed {
    async fn fetch(&self) -> Result<RawSnapshot, FeedError> {
        debug!("Fetching price feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::BadResponse(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let entries: Vec<RawEntry> = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(format!("Feed is not a JSON array of objects: {}", e)))?;

        Ok(RawSnapshot {
            entries,
            fetched_at: Utc::now(),
        })
    }
}
