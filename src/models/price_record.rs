use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// One normalized trading-post price observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub name: String,
    pub price: f64,
    /// Timeline timestamp: the source acquisition time when resolvable,
    /// otherwise the fetch/commit fallback. Always UTC.
    pub commit_time: DateTime<Utc>,
    /// When the collector recorded the row. Absent in files produced by
    /// older collector versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_time: Option<DateTime<Utc>>,
    /// Passthrough source fields outside the canonical schema, stringified.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

/// In-memory concatenation of the lookback window's daily snapshot files,
/// already validity-filtered by the loader.
#[derive(Debug)]
pub struct Dataset {
    pub rows: Vec<PriceRecord>,
    pub window_days: u32,
    pub files_loaded: usize,
    pub files_missing: usize,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
