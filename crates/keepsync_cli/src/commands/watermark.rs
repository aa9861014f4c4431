//! Watermark command implementation.

use super::{describe, open_existing};
use keepsync_store::{RecordStore, Timestamp};
use std::path::Path;

/// Runs the watermark command.
pub fn run(path: &Path, owner: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let watermark = store.watermark(owner)?;
    if watermark == Timestamp::ZERO {
        println!("{owner}: nothing merged yet");
    } else {
        println!("{owner}: {}", describe(watermark));
    }
    Ok(())
}
