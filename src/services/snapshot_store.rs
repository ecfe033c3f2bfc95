use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, SecondsFormat};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::models::PriceRecord;

/// Every snapshot file starts with a BOM so spreadsheet tools pick up UTF-8.
pub const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Fixed leading columns. Extra source fields follow, in first-seen order.
pub const CANONICAL_COLUMNS: [&str; 4] = ["name", "price", "commit_time", "snapshot_time"];

/// Where ingested batches land.
#[derive(Debug, Clone)]
pub enum AppendDestination {
    /// One file per calendar day: `<dir>/<YYYY-MM-DD>.csv`.
    Daily(PathBuf),
    /// Everything in a single file, the legacy layout.
    FlatFile(PathBuf),
}

#[derive(Debug)]
pub struct AppendOutcome {
    pub path: PathBuf,
    pub rows_appended: usize,
    pub file_created: bool,
}

impl AppendDestination {
    pub fn target_path(&self, day: NaiveDate) -> PathBuf {
        match self {
            AppendDestination::Daily(dir) => dir.join(format!("{}.csv", day)),
            AppendDestination::FlatFile(path) => path.clone(),
        }
    }

    /// Appends one batch. The file's day comes from the batch's resolved
    /// timestamps; an existing file keeps its header and later batches are
    /// aligned to it (missing columns empty, unknown columns dropped).
    /// Returns `None` for an empty batch.
    pub fn append(&self, records: &[PriceRecord]) -> Result<Option<AppendOutcome>> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let path = self.target_path(first.commit_time.date_naive());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let existing_header = match read_header(&path) {
            Ok(header) => Some(header),
            Err(ReadHeaderError::Missing) => None,
            Err(ReadHeaderError::Other(e)) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let file_created = existing_header.is_none();
        let header = existing_header.unwrap_or_else(|| build_header(records));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if file_created {
            file.write_all(UTF8_BOM)?;
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(file);
        if file_created {
            writer.write_record(&header)?;
        }
        for record in records {
            writer.write_record(header.iter().map(|column| field_value(record, column)))?;
        }
        writer.flush()?;

        debug!(
            "Appended {} rows to {} (created: {})",
            records.len(),
            path.display(),
            file_created
        );
        Ok(Some(AppendOutcome {
            path,
            rows_appended: records.len(),
            file_created,
        }))
    }
}

enum ReadHeaderError {
    Missing,
    Other(anyhow::Error),
}

fn read_header(path: &Path) -> Result<Vec<String>, ReadHeaderError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ReadHeaderError::Missing)
        }
        Err(e) => return Err(ReadHeaderError::Other(e.into())),
    };
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);
    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Ok(record.iter().map(|cell| cell.to_string()).collect()),
        // Zero-byte or header-less files get rewritten from scratch.
        Ok(false) => Err(ReadHeaderError::Missing),
        Err(e) => Err(ReadHeaderError::Other(e.into())),
    }
}

fn build_header(records: &[PriceRecord]) -> Vec<String> {
    let mut header: Vec<String> = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
    for record in records {
        for key in record.extras.keys() {
            if !header.iter().any(|column| column == key) {
                header.push(key.clone());
            }
        }
    }
    header
}

fn field_value(record: &PriceRecord, column: &str) -> String {
    match column {
        "name" => record.name.clone(),
        "price" => format_price(record.price),
        "commit_time" => format_time(record.commit_time),
        "snapshot_time" => record
            .snapshot_time
            .map(format_time)
            .unwrap_or_default(),
        other => record.extras.get(other).cloned().unwrap_or_default(),
    }
}

fn format_time(time: chrono::DateTime<chrono::Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// Whole prices print without a trailing `.0` so files match what the feed
// sends for integer prices.
fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{}", price as i64)
    } else {
        price.to_string()
    }
}

// =====================
// Tests
// =====================
