use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, info};

use crate::services::snapshot_store::UTF8_BOM;

#[derive(Debug, Clone, Copy)]
pub struct RepairReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
}

/// `history.csv` repairs to `history_clean.csv` next to it.
pub fn default_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("history");
    match source.extension().and_then(|s| s.to_str()) {
        Some(ext) => source.with_file_name(format!("{}_clean.{}", stem, ext)),
        None => source.with_file_name(format!("{}_clean", stem)),
    }
}

/// Rewrites a history CSV keeping only rows that parse against the file's
/// own header, fully quoted with a BOM. Unparseable and wrong-width rows
/// are dropped. The output lands via a temp file so a failed run never
/// leaves a half-written target.
pub fn repair_file(source: &Path, output: &Path) -> Result<RepairReport> {
    info!("Repairing {} -> {}", source.display(), output.display());
    let bytes =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut header = StringRecord::new();
    if !reader
        .read_record(&mut header)
        .context("Failed to read header row")?
    {
        bail!("{} is empty; nothing to repair", source.display());
    }
    let width = header.len();

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let tmp = output.with_extension("tmp");
    let mut report = RepairReport {
        total_rows: 0,
        kept_rows: 0,
        dropped_rows: 0,
    };

    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(UTF8_BOM)?;
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(file);
        writer.write_record(&header)?;

        for result in reader.records() {
            report.total_rows += 1;
            match result {
                Ok(record) if record.len() == width => {
                    writer.write_record(&record)?;
                    report.kept_rows += 1;
                }
                Ok(record) => {
                    debug!(
                        "Dropping row {}: {} fields, expected {}",
                        report.total_rows,
                        record.len(),
                        width
                    );
                    report.dropped_rows += 1;
                }
                Err(e) => {
                    debug!("Dropping row {}: {}", report.total_rows, e);
                    report.dropped_rows += 1;
                }
            }
        }
        writer.flush()?;
    }
    fs::rename(&tmp, output)
        .with_context(|| format!("Failed to move repaired file into {}", output.display()))?;

    info!(
        "✓ Kept {}/{} rows ({} dropped)",
        report.kept_rows, report.total_rows, report.dropped_rows
    );
    Ok(report)
}

// =====================
// Tests
// =====================
