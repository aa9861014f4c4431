//! Inspect command implementation.

use super::{describe, open_existing};
use keepsync_store::{FileRecordStore, RecordStore, SecretKind, Timestamp};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Document size in bytes.
    pub size: u64,
    /// Number of records across all owners.
    pub record_count: usize,
    /// Per-owner statistics.
    pub owners: Vec<OwnerStats>,
}

/// Statistics for a single owner.
#[derive(Debug, Serialize)]
pub struct OwnerStats {
    /// Owner identity.
    pub owner: String,
    /// Number of records.
    pub records: usize,
    /// Records with `merged` unset.
    pub unmerged: usize,
    /// Highest merge stamp, in seconds.
    pub watermark: Timestamp,
    /// Record counts by kind name.
    pub kinds: Vec<(String, usize)>,
}

/// Collects statistics from an open store.
pub fn inspect(store: &FileRecordStore) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut owners = Vec::new();
    for owner in store.owners() {
        let index = store.index(&owner)?;
        let kinds = SecretKind::ALL
            .iter()
            .map(|kind| {
                let count = index.iter().filter(|s| s.kind == *kind).count();
                (kind.name().to_string(), count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();

        owners.push(OwnerStats {
            records: index.len(),
            unmerged: store.unmerged(&owner)?.len(),
            watermark: store.watermark(&owner)?,
            kinds,
            owner,
        });
    }

    Ok(InspectResult {
        path: store.path().display().to_string(),
        size: std::fs::metadata(store.path()).map(|m| m.len()).unwrap_or(0),
        record_count: store.len(),
        owners,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let result = inspect(&store)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("keepsync Store Inspection");
    println!("=========================");
    println!();
    println!("Path:    {}", result.path);
    println!("Size:    {} bytes", result.size);
    println!("Records: {}", result.record_count);

    for stats in &result.owners {
        println!();
        println!("Owner {}:", stats.owner);
        println!("  Records:   {}", stats.records);
        println!("  Unmerged:  {}", stats.unmerged);
        if stats.watermark == Timestamp::ZERO {
            println!("  Watermark: none");
        } else {
            println!("  Watermark: {}", describe(stats.watermark));
        }
        for (kind, count) in &stats.kinds {
            println!("  {kind:<10} {count}");
        }
    }
}
