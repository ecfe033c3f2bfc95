use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use csv::ReaderBuilder;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::MAX_LOOKBACK_DAYS;
use crate::errors::AppError;
use crate::models::{Dataset, PriceRecord};
use crate::services::normalize::{parse_iso_datetime, parse_price_str};
use crate::services::snapshot_store::UTF8_BOM;
use crate::state::AppState;

/// Where the dashboard reads daily snapshot files from.
#[derive(Debug, Clone)]
pub enum SnapshotSource {
    LocalDir(PathBuf),
    /// Base URL; files are fetched as `<base>/<YYYY-MM-DD>.csv`.
    RemoteBase(String),
}

impl SnapshotSource {
    pub fn describe(&self) -> String {
        match self {
            SnapshotSource::LocalDir(dir) => format!("local:{}", dir.display()),
            SnapshotSource::RemoteBase(base) => format!("remote:{}", base),
        }
    }
}

// Scraper artifacts: rows whose "name" is really a date heading.
static DATE_LIKE_NAME: OnceLock<Regex> = OnceLock::new();

pub(crate) fn looks_like_date(name: &str) -> bool {
    DATE_LIKE_NAME
        .get_or_init(|| Regex::new(r"^20\d{2}-\d{2}-\d{2}").expect("valid regex"))
        .is_match(name)
}

/// Returns the cached dataset for this window, loading and caching it on a
/// miss. `days` outside `1..=MAX_LOOKBACK_DAYS` is a validation error.
pub async fn load_cached(state: &AppState, days: u32) -> Result<Arc<Dataset>, AppError> {
    if days == 0 || days > MAX_LOOKBACK_DAYS {
        return Err(AppError::Validation(format!(
            "days must be within 1..={}, got {}",
            MAX_LOOKBACK_DAYS, days
        )));
    }
    if let Some(dataset) = state.dataset_cache.get(days) {
        debug!("Dataset cache hit for {} days", days);
        return Ok(dataset);
    }

    let dataset = Arc::new(load_dataset(&state.config.snapshot_source, &state.http, days).await);
    state.dataset_cache.insert(days, dataset.clone());
    Ok(dataset)
}

/// Loads the last `window_days` daily snapshot files, today included.
/// A day whose file is missing or unreadable is skipped, never fatal.
pub async fn load_dataset(
    source: &SnapshotSource,
    client: &reqwest::Client,
    window_days: u32,
) -> Dataset {
    let today = Utc::now().date_naive();
    let mut rows = Vec::new();
    let mut files_loaded = 0;
    let mut files_missing = 0;

    for offset in 0..i64::from(window_days) {
        let day = today - ChronoDuration::days(offset);
        match fetch_day(source, client, day).await {
            Some(bytes) => {
                rows.extend(parse_snapshot_csv(&bytes, day));
                files_loaded += 1;
            }
            None => {
                files_missing += 1;
            }
        }
    }

    info!(
        "📊 Loaded {} rows from {} snapshot files ({} missing) over {} days",
        rows.len(),
        files_loaded,
        files_missing,
        window_days
    );
    Dataset {
        rows,
        window_days,
        files_loaded,
        files_missing,
    }
}

async fn fetch_day(
    source: &SnapshotSource,
    client: &reqwest::Client,
    day: NaiveDate,
) -> Option<Vec<u8>> {
    match source {
        SnapshotSource::LocalDir(dir) => {
            let path = dir.join(format!("{}.csv", day));
            match fs::read(&path) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("No snapshot for {}", day);
                    None
                }
                Err(e) => {
                    warn!("⚠️ Skipping {}: {}", path.display(), e);
                    None
                }
            }
        }
        SnapshotSource::RemoteBase(base) => {
            let url = day_url(base, day);
            let response = match client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!("⚠️ Skipping {}: {}", url, e);
                    return None;
                }
            };
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                debug!("No snapshot for {}", day);
                return None;
            }
            if !response.status().is_success() {
                warn!("⚠️ Skipping {}: HTTP {}", url, response.status());
                return None;
            }
            match response.bytes().await {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(e) => {
                    warn!("⚠️ Skipping {}: {}", url, e);
                    None
                }
            }
        }
    }
}

fn day_url(base: &str, day: NaiveDate) -> String {
    format!("{}/{}.csv", base, day)
}

/// Parses one snapshot file, dropping rows that fail validity checks:
/// empty or date-like names, unparseable prices or timestamps.
fn parse_snapshot_csv(bytes: &[u8], day: NaiveDate) -> Vec<PriceRecord> {
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut records_iter = reader.records();
    let header: Vec<String> = match records_iter.next() {
        Some(Ok(record)) => record.iter().map(|cell| cell.trim().to_string()).collect(),
        _ => {
            warn!("Snapshot for {} has no header; skipping file", day);
            return Vec::new();
        }
    };

    let name_idx = header.iter().position(|c| c == "name");
    let price_idx = header.iter().position(|c| c == "price");
    let commit_idx = header.iter().position(|c| c == "commit_time");
    let snapshot_idx = header.iter().position(|c| c == "snapshot_time");
    let (Some(name_idx), Some(price_idx), Some(commit_idx)) = (name_idx, price_idx, commit_idx)
    else {
        warn!(
            "Snapshot for {} lacks required columns (header: {:?}); skipping file",
            day, header
        );
        return Vec::new();
    };
    let extra_columns: Vec<(usize, &String)> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            *i != name_idx && *i != price_idx && *i != commit_idx && Some(*i) != snapshot_idx
        })
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0;
    for result in records_iter {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };

        let name = record.get(name_idx).map(str::trim).unwrap_or_default();
        if name.is_empty() || looks_like_date(name) {
            skipped += 1;
            continue;
        }
        let Some(price) = record.get(price_idx).and_then(parse_price_str) else {
            skipped += 1;
            continue;
        };
        let Some(commit_time) = record.get(commit_idx).and_then(parse_iso_datetime) else {
            skipped += 1;
            continue;
        };
        let snapshot_time = snapshot_idx
            .and_then(|i| record.get(i))
            .and_then(parse_iso_datetime);

        let extras = extra_columns
            .iter()
            .filter_map(|(i, column)| {
                record
                    .get(*i)
                    .filter(|cell| !cell.is_empty())
                    .map(|cell| ((*column).clone(), cell.to_string()))
            })
            .collect();

        rows.push(PriceRecord {
            name: name.to_string(),
            price,
            commit_time,
            snapshot_time,
            extras,
        });
    }

    if skipped > 0 {
        debug!("Snapshot for {}: skipped {} invalid rows", day, skipped);
    }
    rows
}

/// Min and max calendar day over the timestamps, ignoring anything before
/// 2000-01-01 (sentinel epochs from old scraped rows). Falls back to
/// (today, today) when nothing survives.
pub fn safe_date_range<I>(times: I) -> (NaiveDate, NaiveDate)
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let floor = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
    let mut min: Option<NaiveDate> = None;
    let mut max: Option<NaiveDate> = None;

    for time in times {
        let day = time.date_naive();
        if day < floor {
            continue;
        }
        min = Some(min.map_or(day, |m| m.min(day)));
        max = Some(max.map_or(day, |m| m.max(day)));
    }

    match (min, max) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            let today = Utc::now().date_naive();
            (today, today)
        }
    }
}

// =====================
// Tests
// =====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn with_bom(body: &str) -> Vec<u8> {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(body.as_bytes());
        bytes
    }

    #[test]
    fn parses_quoted_snapshot_with_extras() {
        let bytes = with_bom(
            "\"name\",\"price\",\"commit_time\",\"snapshot_time\",\"grade\"\n\
             \"Steel, Helmet\",\"320\",\"2025-06-01T12:00:00Z\",\"2025-06-01T12:00:05Z\",\"4\"\n",
        );

        let rows = parse_snapshot_csv(&bytes, day());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Steel, Helmet");
        assert_eq!(rows[0].price, 320.0);
        assert_eq!(
            rows[0].commit_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        );
        assert!(rows[0].snapshot_time.is_some());
        assert_eq!(rows[0].extras.get("grade").map(String::as_str), Some("4"));
    }

    #[test]
    fn drops_invalid_and_date_like_rows() {
        let bytes = with_bom(
            "\"name\",\"price\",\"commit_time\"\n\
             \"2025-06-01\",\"10\",\"2025-06-01T12:00:00Z\"\n\
             \"\",\"10\",\"2025-06-01T12:00:00Z\"\n\
             \"Helmet\",\"junk\",\"2025-06-01T12:00:00Z\"\n\
             \"Helmet\",\"320\",\"not a time\"\n\
             \"Helmet\",\"320\",\"2025-06-01T12:00:00Z\"\n",
        );

        let rows = parse_snapshot_csv(&bytes, day());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Helmet");
    }

    #[test]
    fn reads_legacy_files_without_snapshot_time() {
        // Older collectors wrote pandas-style offsets and no snapshot_time.
        let bytes = with_bom(
            "\"name\",\"price\",\"commit_time\"\n\
             \"Helmet\",\"320\",\"2025-06-01 12:00:00+00:00\"\n",
        );

        let rows = parse_snapshot_csv(&bytes, day());
        assert_eq!(rows.len(), 1);
        assert!(rows[0].snapshot_time.is_none());
        assert_eq!(
            rows[0].commit_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn file_without_required_columns_is_skipped() {
        let bytes = with_bom("\"item\",\"value\"\n\"Helmet\",\"320\"\n");
        assert!(parse_snapshot_csv(&bytes, day()).is_empty());
    }

    #[tokio::test]
    async fn local_loader_counts_missing_days() {
        let dir = tempfile::tempdir().unwrap();
        let today = Utc::now().date_naive();
        let body = format!(
            "\"name\",\"price\",\"commit_time\"\n\"Helmet\",\"320\",\"{}T12:00:00Z\"\n",
            today
        );
        fs::write(dir.path().join(format!("{}.csv", today)), with_bom(&body)).unwrap();

        let source = SnapshotSource::LocalDir(dir.path().to_path_buf());
        let dataset = load_dataset(&source, &reqwest::Client::new(), 3).await;

        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(dataset.files_loaded, 1);
        assert_eq!(dataset.files_missing, 2);
        assert_eq!(dataset.window_days, 3);
    }

    #[test]
    fn remote_day_urls_follow_the_snapshot_layout() {
        let base = "https://raw.githubusercontent.com/acme/price-data/master/data";
        assert_eq!(
            day_url(base, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()),
            "https://raw.githubusercontent.com/acme/price-data/master/data/2026-06-01.csv"
        );
    }

    #[test]
    fn safe_date_range_ignores_pre_2000_sentinels() {
        let times = vec![
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap(),
        ];
        let (min, max) = safe_date_range(times);
        assert_eq!(min, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());
    }

    #[test]
    fn safe_date_range_falls_back_to_today() {
        let today = Utc::now().date_naive();
        assert_eq!(safe_date_range(Vec::new()), (today, today));

        let only_junk = vec![Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()];
        assert_eq!(safe_date_range(only_junk), (today, today));
    }

    #[test]
    fn date_like_names_match_scraper_headings() {
        assert!(looks_like_date("2025-06-01"));
        assert!(looks_like_date("2025-06-01 extra"));
        assert!(!looks_like_date("Helmet 2025"));
        assert!(!looks_like_date("1999-06-01"));
    }
}
