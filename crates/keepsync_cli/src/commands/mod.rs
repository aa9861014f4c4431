//! CLI command implementations.

pub mod inspect;
pub mod merge;
pub mod unmerged;
pub mod watermark;

use keepsync_store::FileRecordStore;
use std::path::Path;

/// Opens an existing store; unlike `FileRecordStore::open`, never creates one.
pub(crate) fn open_existing(path: &Path) -> Result<FileRecordStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No record store found at {:?}", path).into());
    }
    Ok(FileRecordStore::open(path)?)
}

/// Seconds plus RFC 3339, or just seconds when the instant is out of range.
pub(crate) fn describe(ts: keepsync_store::Timestamp) -> String {
    match ts.to_rfc3339() {
        Ok(text) => format!("{} ({})", ts.as_secs(), text),
        Err(_) => ts.as_secs().to_string(),
    }
}
