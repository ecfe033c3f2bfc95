use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use tracing::{info, warn};

use crate::external::price_feed::PriceFeed;
use crate::models::PriceRecord;
use crate::services::normalize::{normalize_batch, NormalizeOutcome};
use crate::services::snapshot_store::AppendDestination;

#[derive(Debug)]
pub struct IngestOutcome {
    pub rows_appended: usize,
    pub rows_dropped: usize,
    pub path: Option<PathBuf>,
}

/// One collector run: fetch the feed, normalize, append.
pub async fn collect_once(
    feed: &dyn PriceFeed,
    destination: &AppendDestination,
) -> Result<IngestOutcome> {
    info!("Fetching latest prices");
    let snapshot = feed.fetch().await.context("Failed to fetch price feed")?;

    if snapshot.entries.is_empty() {
        info!("Feed returned no entries; nothing to append");
        return Ok(IngestOutcome {
            rows_appended: 0,
            rows_dropped: 0,
            path: None,
        });
    }
    info!("Fetched {} feed entries", snapshot.entries.len());

    let NormalizeOutcome { records, dropped } =
        normalize_batch(&snapshot.entries, snapshot.fetched_at, snapshot.fetched_at);
    if dropped > 0 {
        warn!("⚠️ Dropped {} malformed feed entries", dropped);
    }

    match destination.append(&records)? {
        Some(outcome) => {
            info!(
                "✓ Appended {} rows to {}",
                outcome.rows_appended,
                outcome.path.display()
            );
            Ok(IngestOutcome {
                rows_appended: outcome.rows_appended,
                rows_dropped: dropped,
                path: Some(outcome.path),
            })
        }
        None => {
            warn!("Every fetched entry was malformed; nothing appended");
            Ok(IngestOutcome {
                rows_appended: 0,
                rows_dropped: dropped,
                path: None,
            })
        }
    }
}

const MOCK_ITEMS: [(&str, f64); 5] = [
    ("Steel Helmet", 320.0),
    ("Tactical Vest", 1450.0),
    ("5.56mm Ammo Box", 95.0),
    ("Sniper Scope", 2100.0),
    ("Field Medkit", 480.0),
];

/// Seeds `days` daily snapshot files with random-walk prices so the
/// dashboard has data without network access. Returns the file count.
pub fn seed_mock(data_dir: &Path, days: u32) -> Result<usize> {
    let destination = AppendDestination::Daily(data_dir.to_path_buf());
    let today = Utc::now().date_naive();
    let mut prices: Vec<f64> = MOCK_ITEMS.iter().map(|(_, base)| *base).collect();
    let mut files = 0;

    for offset in (0..i64::from(days)).rev() {
        let day = today - ChronoDuration::days(offset);
        let noon = day.and_time(NaiveTime::MIN).and_utc() + ChronoDuration::hours(12);

        let mut batch = Vec::with_capacity(MOCK_ITEMS.len());
        for (i, (name, _)) in MOCK_ITEMS.iter().enumerate() {
            prices[i] *= 1.0 + (rand::random::<f64>() - 0.5) * 0.02;

            batch.push(PriceRecord {
                name: (*name).to_string(),
                price: (prices[i] * 100.0).round() / 100.0,
                commit_time: noon,
                snapshot_time: Some(Utc::now()),
                extras: BTreeMap::new(),
            });
        }

        if destination.append(&batch)?.is_some() {
            files += 1;
        }
    }

    info!("Seeded {} mock snapshot files under {}", files, data_dir.display());
    Ok(files)
}

// =====================
// Tests
// =====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::price_feed::{FeedError, RawSnapshot};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct FixtureFeed {
        payload: serde_json::Value,
    }

    #[async_trait]
    impl PriceFeed for FixtureFeed {
        async fn fetch(&self) -> Result<RawSnapshot, FeedError> {
            let entries = self
                .payload
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_object().unwrap().clone())
                .collect();
            Ok(RawSnapshot {
                entries,
                fetched_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            })
        }
    }

    #[tokio::test]
    async fn collect_once_appends_normalized_rows() {
        let dir = tempfile::tempdir().unwrap();
        let destination = AppendDestination::Daily(dir.path().to_path_buf());
        let feed = FixtureFeed {
            payload: json!([
                { "name": "Steel Helmet", "price": 320, "is_get_time": 1_748_768_400 },
                { "name": "", "price": 5 }
            ]),
        };

        let outcome = collect_once(&feed, &destination).await.unwrap();
        assert_eq!(outcome.rows_appended, 1);
        assert_eq!(outcome.rows_dropped, 1);
        let path = outcome.path.unwrap();
        assert!(path.exists());
        // 1748768400 = 2025-06-01T09:00:00Z, so the daily file is for June 1.
        assert_eq!(path.file_name().unwrap(), "2025-06-01.csv");
    }

    #[tokio::test]
    async fn empty_feed_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let destination = AppendDestination::Daily(dir.path().to_path_buf());
        let feed = FixtureFeed { payload: json!([]) };

        let outcome = collect_once(&feed, &destination).await.unwrap();
        assert_eq!(outcome.rows_appended, 0);
        assert!(outcome.path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn seed_mock_writes_one_file_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let files = seed_mock(dir.path(), 7).unwrap();
        assert_eq!(files, 7);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 7);
    }
}
