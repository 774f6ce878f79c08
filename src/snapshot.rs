// 📥 Fetch Snapshots
// Loading `transactions*.json` snapshots and the merged, deduplicated record file.

use crate::deduplication::DeduplicationEngine;
use crate::parser::{RawTransaction, RawTransactionBatch};
use crate::report::write_json;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

pub const MERGED_LATEST_FILE: &str = "merged_transactions_latest.json";

static SNAPSHOT_FILE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^transactions.*\.json$").ok());

/// Snapshot files in `data_dir`, sorted by name
pub fn snapshot_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = SNAPSHOT_FILE
        .as_ref()
        .context("Snapshot file pattern failed to compile")?;

    let mut files: Vec<PathBuf> = fs::read_dir(data_dir)
        .with_context(|| format!("Failed to read data directory: {:?}", data_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.is_match(name))
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn load_snapshot(path: &Path) -> Result<RawTransactionBatch> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse snapshot: {:?}", path))
}

/// Every snapshot in `data_dir`, concatenated in file-name order
pub fn load_snapshots(data_dir: &Path) -> Result<RawTransactionBatch> {
    let mut merged = RawTransactionBatch::default();
    for path in snapshot_files(data_dir)? {
        tracing::info!(path = %path.display(), "opening snapshot");
        merged = merged.concat(load_snapshot(&path)?);
    }
    Ok(merged)
}

/// Booked records of every snapshot, deduplicated. Pending records are dropped:
/// they carry no stable identity.
pub fn merge_snapshots(data_dir: &Path) -> Result<Vec<RawTransaction>> {
    let batch = load_snapshots(data_dir)?;
    if !batch.pending.is_empty() {
        tracing::info!(count = batch.pending.len(), "ignoring pending records");
    }

    let merged = DeduplicationEngine::new().dedupe(&batch.booked);
    tracing::info!(booked = batch.booked.len(), merged = merged.len(), "snapshots merged");
    Ok(merged)
}

/// Write `merged_transactions-<timestamp>.json` and the `_latest` copy
pub fn write_merged(data_dir: &Path, records: &[RawTransaction], now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
    let stamped = data_dir.join(format!(
        "merged_transactions-{}.json",
        now.format("%Y-%m-%dT%H-%M-%S")
    ));
    Ok(vec![
        write_json(&stamped, records)?,
        write_json(&data_dir.join(MERGED_LATEST_FILE), records)?,
    ])
}

/// A merged record file: a JSON array of booked records
pub fn load_merged(path: &Path) -> Result<Vec<RawTransaction>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transactions file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse transactions file: {:?}", path))
}
