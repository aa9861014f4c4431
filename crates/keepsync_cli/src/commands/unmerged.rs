//! Unmerged command implementation.

use super::{describe, open_existing};
use keepsync_store::{RecordStore, RecordSummary, SecretRecord};
use std::path::Path;

/// Runs the unmerged command.
pub fn run(path: &Path, owner: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let pending: Vec<RecordSummary> = store
        .unmerged(owner)?
        .iter()
        .map(SecretRecord::summary)
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        _ => {
            if pending.is_empty() {
                println!("{owner}: no unmerged records");
            }
            for summary in &pending {
                println!(
                    "  {:<24} {:<10} updated {}",
                    summary.id,
                    summary.kind.name(),
                    describe(summary.updated)
                );
            }
        }
    }
    Ok(())
}
