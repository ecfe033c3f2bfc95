use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::models::Dataset;

#[derive(Clone)]
struct CacheEntry {
    dataset: Arc<Dataset>,
    loaded_at: DateTime<Utc>,
}

/// Row in the admin cache listing.
#[derive(Debug, Serialize)]
pub struct CacheEntryInfo {
    pub window_days: u32,
    pub age_secs: i64,
    pub rows: usize,
    pub files_loaded: usize,
}

/// Thread-safe TTL cache of loaded datasets, keyed by lookback window.
/// Keeps dashboard interactions from re-reading every snapshot file.
#[derive(Clone)]
pub struct DatasetCache {
    cache: Arc<DashMap<u32, CacheEntry>>,
    ttl: Duration,
}

impl DatasetCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Returns the dataset for this window if it is still within TTL.
    pub fn get(&self, window_days: u32) -> Option<Arc<Dataset>> {
        if let Some(entry) = self.cache.get(&window_days) {
            let cached = entry.value().clone();
            let now = Utc::now();

            if now < cached.loaded_at + self.ttl {
                return Some(cached.dataset);
            } else {
                // TTL expired, remove from cache
                drop(entry); // Release the read lock
                self.cache.remove(&window_days);
            }
        }
        None
    }

    pub fn insert(&self, window_days: u32, dataset: Arc<Dataset>) {
        self.cache.insert(
            window_days,
            CacheEntry {
                dataset,
                loaded_at: Utc::now(),
            },
        );
    }

    /// Drops every entry. Returns how many were dropped.
    pub fn invalidate_all(&self) -> usize {
        let count = self.cache.len();
        self.cache.clear();
        count
    }

    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let now = Utc::now();
        self.cache
            .iter()
            .map(|entry| CacheEntryInfo {
                window_days: *entry.key(),
                age_secs: (now - entry.value().loaded_at).num_seconds(),
                rows: entry.value().dataset.rows.len(),
                files_loaded: entry.value().dataset.files_loaded,
            })
            .collect()
    }
}
