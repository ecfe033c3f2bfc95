use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::external::feed_repo::{FeedRepo, RevisionInfo};
use crate::external::price_feed::RawEntry;
use crate::services::normalize::{normalize_batch, NormalizeOutcome};
use crate::services::rate_limiter::RequestPacer;
use crate::services::snapshot_store::AppendDestination;

#[derive(Debug)]
pub struct BackfillOptions {
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
    pub destination: AppendDestination,
    /// Delete an existing flat history file before writing.
    pub fresh: bool,
}

#[derive(Debug, Default)]
pub struct BackfillSummary {
    pub revisions_seen: usize,
    pub days_picked: usize,
    pub revisions_skipped: usize,
    pub rows_appended: usize,
}

/// Keeps the first revision seen per calendar day. The listing arrives
/// newest first, so this keeps each day's latest snapshot.
pub fn pick_one_per_day(revisions: &[RevisionInfo]) -> Vec<RevisionInfo> {
    let mut seen_days = HashSet::new();
    revisions
        .iter()
        .filter(|revision| seen_days.insert(revision.committed_at.date_naive()))
        .cloned()
        .collect()
}

/// Rebuilds history from the feed file's revisions, one snapshot per day.
/// A revision that fails to download or parse is skipped, not fatal.
pub async fn run(
    repo: &FeedRepo,
    pacer: &RequestPacer,
    options: &BackfillOptions,
) -> Result<BackfillSummary> {
    info!("Listing feed revisions since {}", options.since);
    let revisions = repo
        .list_revisions(options.since, options.until)
        .await
        .context("Failed to list feed revisions")?;

    let mut summary = BackfillSummary {
        revisions_seen: revisions.len(),
        ..Default::default()
    };
    if revisions.is_empty() {
        info!("No revisions in range; nothing to backfill");
        return Ok(summary);
    }

    let picked = pick_one_per_day(&revisions);
    summary.days_picked = picked.len();
    info!(
        "Picked {} daily snapshots out of {} revisions",
        picked.len(),
        revisions.len()
    );

    if options.fresh {
        if let AppendDestination::FlatFile(path) = &options.destination {
            if path.exists() {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                info!("Removed existing history file {}", path.display());
            }
        }
    }

    for (i, revision) in picked.iter().enumerate() {
        pacer.pace().await;
        let short_sha = revision.sha.get(..7).unwrap_or(&revision.sha);
        info!(
            "[{}/{}] {} ({})",
            i + 1,
            picked.len(),
            revision.committed_at.date_naive(),
            short_sha
        );

        let payload = match repo.fetch_content(&revision.sha).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️ Skipping revision {}: {}", short_sha, e);
                summary.revisions_skipped += 1;
                continue;
            }
        };
        let entries = match as_entries(payload) {
            Some(entries) if !entries.is_empty() => entries,
            _ => {
                warn!("⚠️ Skipping revision {}: payload is not a usable JSON array", short_sha);
                summary.revisions_skipped += 1;
                continue;
            }
        };

        let NormalizeOutcome { records, dropped } =
            normalize_batch(&entries, revision.committed_at, Utc::now());
        if dropped > 0 {
            warn!("Dropped {} malformed entries at {}", dropped, short_sha);
        }

        match options.destination.append(&records)? {
            Some(outcome) => summary.rows_appended += outcome.rows_appended,
            None => {
                warn!("⚠️ Skipping revision {}: no valid rows", short_sha);
                summary.revisions_skipped += 1;
            }
        }
    }

    info!(
        "✓ Backfill complete: {} rows appended, {} revisions skipped",
        summary.rows_appended, summary.revisions_skipped
    );
    Ok(summary)
}

fn as_entries(payload: Value) -> Option<Vec<RawEntry>> {
    match payload {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

// =====================
// Tests
// =====================
