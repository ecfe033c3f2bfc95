use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::external::price_feed::RawEntry;
use crate::models::PriceRecord;

/// Feed field carrying the upstream acquisition time, when present.
pub const GET_TIME_FIELD: &str = "is_get_time";

// Numeric timestamps outside 2000..2100 are junk (zeroed fields,
// millisecond epochs) and must not win over the fallback.
const EPOCH_MIN: i64 = 946_684_800;
const EPOCH_MAX: i64 = 4_102_444_800;

#[derive(Debug)]
pub struct NormalizeOutcome {
    pub records: Vec<PriceRecord>,
    pub dropped: usize,
}

/// Normalizes one fetched batch into records.
///
/// Entries without a usable name or price are dropped. Timestamps resolve
/// per batch: the acquisition field is read as epoch seconds first; if no
/// entry in the batch parses that way, the whole batch is re-read as ISO
/// strings; entries still unresolved get `fallback`. The tier choice is
/// batch-level so a file never mixes interpretations of the same field.
pub fn normalize_batch(
    entries: &[RawEntry],
    fallback: DateTime<Utc>,
    snapshot_time: DateTime<Utc>,
) -> NormalizeOutcome {
    let mut kept: Vec<(&RawEntry, String, f64)> = Vec::with_capacity(entries.len());
    let mut dropped = 0;

    for entry in entries {
        let name = entry.get("name").and_then(field_as_name);
        let price = entry.get("price").and_then(parse_price);
        match (name, price) {
            (Some(name), Some(price)) => kept.push((entry, name, price)),
            _ => dropped += 1,
        }
    }

    let candidates: Vec<Option<&Value>> = kept
        .iter()
        .map(|(entry, _, _)| entry.get(GET_TIME_FIELD))
        .collect();

    let mut resolved: Vec<Option<DateTime<Utc>>> = candidates
        .iter()
        .map(|v| v.and_then(parse_epoch_value))
        .collect();

    if resolved.iter().all(Option::is_none) {
        debug!("No epoch timestamps in batch; retrying field as ISO strings");
        resolved = candidates
            .iter()
            .map(|v| v.and_then(parse_iso_value))
            .collect();
    }

    let records = kept
        .into_iter()
        .zip(resolved)
        .map(|((entry, name, price), time)| PriceRecord {
            name,
            price,
            commit_time: time.unwrap_or(fallback),
            snapshot_time: Some(snapshot_time),
            extras: collect_extras(entry),
        })
        .collect();

    NormalizeOutcome { records, dropped }
}

fn field_as_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts numbers and numeric strings, tolerating thousands separators.
pub fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_price_str(s)?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

pub fn parse_price_str(s: &str) -> Option<f64> {
    let cleaned = s.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn parse_epoch_value(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))?
        }
        _ => return None,
    };
    if !(EPOCH_MIN..=EPOCH_MAX).contains(&secs) {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_iso_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_iso_datetime(s),
        _ => None,
    }
}

/// Parses the timestamp shapes that appear in feeds and stored snapshots:
/// RFC 3339, the space-separated offset form older files carry, naive
/// datetimes (taken as UTC), and bare dates (taken as UTC midnight).
pub fn parse_iso_datetime(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim().trim_start_matches('\u{feff}');
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc());
    }
    None
}

fn collect_extras(entry: &RawEntry) -> BTreeMap<String, String> {
    entry
        .iter()
        .filter(|(key, _)| key.as_str() != "name" && key.as_str() != "price")
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// =====================
// Tests
// =====================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(fields: Value) -> RawEntry {
        match fields {
            Value::Object(map) => map,
            _ => panic!("test entry must be an object"),
        }
    }

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn epoch_timestamps_resolve_directly() {
        let entries = vec![entry(json!({
            "name": "Steel Helmet",
            "price": 320,
            "is_get_time": 1_749_981_600
        }))];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(
            outcome.records[0].commit_time,
            Utc.timestamp_opt(1_749_981_600, 0).unwrap()
        );
    }

    #[test]
    fn iso_tier_kicks_in_only_when_no_epoch_parses() {
        let entries = vec![
            entry(json!({
                "name": "Tactical Vest",
                "price": 1450.0,
                "is_get_time": "2025-06-01T10:30:00Z"
            })),
            entry(json!({
                "name": "Field Medkit",
                "price": 480.0,
                "is_get_time": "2025-06-01 11:00:00"
            })),
        ];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        assert_eq!(
            outcome.records[0].commit_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap()
        );
        assert_eq!(
            outcome.records[1].commit_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn one_valid_epoch_pins_the_batch_to_the_epoch_tier() {
        // The ISO string must NOT be parsed once any entry parsed as epoch.
        let entries = vec![
            entry(json!({
                "name": "Sniper Scope",
                "price": 2100,
                "is_get_time": 1_749_981_600
            })),
            entry(json!({
                "name": "Tactical Vest",
                "price": 1450,
                "is_get_time": "2025-06-01T10:30:00Z"
            })),
        ];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        assert_eq!(
            outcome.records[0].commit_time,
            Utc.timestamp_opt(1_749_981_600, 0).unwrap()
        );
        assert_eq!(outcome.records[1].commit_time, fallback());
    }

    #[test]
    fn missing_field_falls_back_to_fetch_time() {
        let entries = vec![entry(json!({ "name": "Steel Helmet", "price": 320 }))];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        assert_eq!(outcome.records[0].commit_time, fallback());
    }

    #[test]
    fn out_of_range_epochs_are_rejected() {
        // Millisecond epoch and zero both land outside 2000..2100.
        let entries = vec![
            entry(json!({
                "name": "Steel Helmet",
                "price": 320,
                "is_get_time": 1_749_981_600_000_i64
            })),
            entry(json!({
                "name": "Tactical Vest",
                "price": 1450,
                "is_get_time": 0
            })),
        ];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        assert!(outcome
            .records
            .iter()
            .all(|r| r.commit_time == fallback()));
    }

    #[test]
    fn entries_without_name_or_price_are_dropped() {
        let entries = vec![
            entry(json!({ "name": "", "price": 100 })),
            entry(json!({ "price": 100 })),
            entry(json!({ "name": "Ammo Box", "price": "not a number" })),
            entry(json!({ "name": "Ammo Box", "price": "1,250.5" })),
        ];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        assert_eq!(outcome.dropped, 3);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].price, 1250.5);
    }

    #[test]
    fn extras_keep_unknown_fields_and_skip_canonical_ones() {
        let entries = vec![entry(json!({
            "name": "Steel Helmet",
            "price": 320,
            "grade": 4,
            "is_get_time": 1_749_981_600
        }))];

        let outcome = normalize_batch(&entries, fallback(), fallback());
        let extras = &outcome.records[0].extras;
        assert_eq!(extras.get("grade").map(String::as_str), Some("4"));
        assert_eq!(
            extras.get(GET_TIME_FIELD).map(String::as_str),
            Some("1749981600")
        );
        assert!(!extras.contains_key("name"));
        assert!(!extras.contains_key("price"));
    }

    #[test]
    fn iso_parser_handles_stored_snapshot_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap();
        for raw in [
            "2025-06-01T10:30:00Z",
            "2025-06-01T10:30:00+00:00",
            "2025-06-01 10:30:00+00:00",
            "2025-06-01 10:30:00",
            "2025-06-01T10:30:00",
        ] {
            assert_eq!(parse_iso_datetime(raw), Some(expected), "input {:?}", raw);
        }
        assert_eq!(
            parse_iso_datetime("2025-06-01"),
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_iso_datetime("garbage"), None);
        assert_eq!(parse_iso_datetime(""), None);
    }
}
