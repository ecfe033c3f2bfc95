use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::errors::AppError;
use crate::models::{Dataset, Granularity, ItemDateRange, PriceRecord, PriceStats, SeriesPoint};
use crate::services::{dataset_service, stats};

/// Distinct item names, sorted, optionally narrowed by a substring match.
pub fn item_names(dataset: &Dataset, keyword: Option<&str>) -> Result<Vec<String>, AppError> {
    if dataset.is_empty() {
        return Err(no_data());
    }
    let needle = keyword.map(str::trim).filter(|k| !k.is_empty());

    let mut names: Vec<String> = dataset
        .rows
        .iter()
        .map(|record| record.name.as_str())
        .filter(|name| needle.map_or(true, |k| name.contains(k)))
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();

    if names.is_empty() {
        return Err(AppError::NoData(format!(
            "No items match keyword '{}'",
            needle.unwrap_or_default()
        )));
    }
    Ok(names)
}

/// One item's series within `[start, end]`, chronological. At `Daily`
/// granularity each day collapses to its mean, stamped at UTC midnight.
pub fn item_history(
    dataset: &Dataset,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
) -> Result<Vec<SeriesPoint>, AppError> {
    let mut points: Vec<SeriesPoint> = dataset
        .rows
        .iter()
        .filter(|record| record.name == name)
        .filter(|record| {
            let day = record.commit_time.date_naive();
            day >= start && day <= end
        })
        .map(|record| SeriesPoint {
            time: record.commit_time,
            price: record.price,
        })
        .collect();

    if points.is_empty() {
        return Err(AppError::NotFound(format!(
            "No records for '{}' between {} and {}",
            name, start, end
        )));
    }
    points.sort_by_key(|point| point.time);

    if granularity == Granularity::Daily {
        let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for point in &points {
            let bucket = buckets.entry(point.time.date_naive()).or_insert((0.0, 0));
            bucket.0 += point.price;
            bucket.1 += 1;
        }
        points = buckets
            .into_iter()
            .map(|(day, (sum, count))| SeriesPoint {
                time: day.and_time(NaiveTime::MIN).and_utc(),
                price: sum / count as f64,
            })
            .collect();
    }
    Ok(points)
}

/// Stats over the series exactly as charted, so daily granularity
/// summarizes the aggregated points, not the raw rows.
pub fn item_stats(
    dataset: &Dataset,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
) -> Result<PriceStats, AppError> {
    let series = item_history(dataset, name, start, end, granularity)?;
    stats::summarize(&series)
        .ok_or_else(|| AppError::NotFound(format!("No records for '{}'", name)))
}

/// Newest rows for one item, full records for the raw table view.
pub fn recent_records(
    dataset: &Dataset,
    name: &str,
    limit: usize,
) -> Result<Vec<PriceRecord>, AppError> {
    let mut rows: Vec<PriceRecord> = dataset
        .rows
        .iter()
        .filter(|record| record.name == name)
        .cloned()
        .collect();
    if rows.is_empty() {
        return Err(AppError::NotFound(format!("No records for item '{}'", name)));
    }
    rows.sort_by(|a, b| b.commit_time.cmp(&a.commit_time));
    rows.truncate(limit);
    Ok(rows)
}

/// Date bounds for the item picker: dataset-wide plus the item's own,
/// clamped into the global bounds.
pub fn date_range(dataset: &Dataset, name: &str) -> Result<ItemDateRange, AppError> {
    if dataset.is_empty() {
        return Err(no_data());
    }
    let (global_min, global_max) =
        dataset_service::safe_date_range(dataset.rows.iter().map(|r| r.commit_time));

    let item_times: Vec<_> = dataset
        .rows
        .iter()
        .filter(|record| record.name == name)
        .map(|record| record.commit_time)
        .collect();
    if item_times.is_empty() {
        return Err(AppError::NotFound(format!("No records for item '{}'", name)));
    }
    let (raw_min, raw_max) = dataset_service::safe_date_range(item_times);

    let mut item_min = raw_min.max(global_min);
    let mut item_max = raw_max.min(global_max);
    if item_min > item_max {
        item_min = global_min;
        item_max = global_max;
    }

    Ok(ItemDateRange {
        global_min,
        global_max,
        item_min,
        item_max,
    })
}

fn no_data() -> AppError {
    AppError::NoData(
        "No snapshot data loaded; run the collector or widen the lookback window".to_string(),
    )
}

// =====================
// Tests
// =====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(name: &str, price: f64, day: u32, hour: u32) -> PriceRecord {
        PriceRecord {
            name: name.to_string(),
            price,
            commit_time: Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap(),
            snapshot_time: None,
            extras: BTreeMap::new(),
        }
    }

    fn dataset(rows: Vec<PriceRecord>) -> Dataset {
        Dataset {
            rows,
            window_days: 30,
            files_loaded: 1,
            files_missing: 0,
        }
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn item_names_are_sorted_distinct_and_filterable() {
        let data = dataset(vec![
            record("Tactical Vest", 1450.0, 1, 10),
            record("Steel Helmet", 320.0, 1, 10),
            record("Steel Helmet", 321.0, 2, 10),
            record("Ammo Box", 95.0, 1, 10),
        ]);

        let all = item_names(&data, None).unwrap();
        assert_eq!(all, vec!["Ammo Box", "Steel Helmet", "Tactical Vest"]);

        let filtered = item_names(&data, Some("Steel")).unwrap();
        assert_eq!(filtered, vec!["Steel Helmet"]);

        // Blank keyword behaves like no keyword.
        assert_eq!(item_names(&data, Some("  ")).unwrap().len(), 3);

        assert!(matches!(
            item_names(&data, Some("zzz")),
            Err(AppError::NoData(_))
        ));
    }

    #[test]
    fn empty_dataset_is_no_data() {
        let data = dataset(Vec::new());
        assert!(matches!(item_names(&data, None), Err(AppError::NoData(_))));
        assert!(matches!(
            date_range(&data, "Helmet"),
            Err(AppError::NoData(_))
        ));
    }

    #[test]
    fn raw_history_is_chronological_and_date_bounded() {
        let data = dataset(vec![
            record("Helmet", 330.0, 2, 18),
            record("Helmet", 320.0, 1, 12),
            record("Helmet", 325.0, 2, 9),
            record("Helmet", 999.0, 5, 12),
            record("Vest", 1450.0, 2, 9),
        ]);

        let points =
            item_history(&data, "Helmet", june(1), june(2), Granularity::Raw).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|w| w[0].time <= w[1].time));
        assert_eq!(points[0].price, 320.0);
        assert_eq!(points[2].price, 330.0);
    }

    #[test]
    fn daily_granularity_averages_each_day() {
        let data = dataset(vec![
            record("Helmet", 100.0, 1, 9),
            record("Helmet", 200.0, 2, 9),
            record("Helmet", 150.0, 2, 18),
        ]);

        let points =
            item_history(&data, "Helmet", june(1), june(2), Granularity::Daily).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 100.0);
        assert_eq!(points[1].price, 175.0);
        assert_eq!(
            points[1].time,
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn stats_follow_the_charted_granularity() {
        let data = dataset(vec![
            record("Helmet", 100.0, 1, 9),
            record("Helmet", 200.0, 2, 9),
            record("Helmet", 150.0, 2, 18),
        ]);

        let raw = item_stats(&data, "Helmet", june(1), june(2), Granularity::Raw).unwrap();
        assert_eq!(raw.points, 3);
        assert_eq!(raw.max_price, 200.0);

        let daily = item_stats(&data, "Helmet", june(1), june(2), Granularity::Daily).unwrap();
        assert_eq!(daily.points, 2);
        assert_eq!(daily.max_price, 175.0);
        assert!((daily.mean_price - 137.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_item_history_is_not_found() {
        let data = dataset(vec![record("Helmet", 320.0, 1, 12)]);
        assert!(matches!(
            item_history(&data, "Ghost", june(1), june(30), Granularity::Raw),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn recent_records_are_newest_first_and_limited() {
        let data = dataset(vec![
            record("Helmet", 320.0, 1, 12),
            record("Helmet", 321.0, 3, 12),
            record("Helmet", 322.0, 2, 12),
        ]);

        let rows = recent_records(&data, "Helmet", 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 321.0);
        assert_eq!(rows[1].price, 322.0);
    }

    #[test]
    fn date_range_clamps_item_bounds_into_global() {
        let mut ancient = record("Helmet", 1.0, 1, 0);
        ancient.commit_time = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();

        let data = dataset(vec![
            ancient,
            record("Helmet", 320.0, 2, 12),
            record("Vest", 1450.0, 1, 12),
            record("Vest", 1460.0, 5, 12),
        ]);

        let range = date_range(&data, "Helmet").unwrap();
        assert_eq!(range.global_min, june(1));
        assert_eq!(range.global_max, june(5));
        // The 1970 sentinel is ignored, leaving one valid Helmet day.
        assert_eq!(range.item_min, june(2));
        assert_eq!(range.item_max, june(2));
    }
}
