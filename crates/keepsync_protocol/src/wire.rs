//! JSON shape of a secret record.

use crate::error::{ProtocolError, ProtocolResult};
use keepsync_store::{SecretKind, SecretRecord, Timestamp};
use serde::{Deserialize, Serialize};

/// A secret record as it travels between client and server.
///
/// ```json
/// {"usr":"alice","id":"bank","type":1,"data":"9f3c…","updated":"2024-01-01T00:00:00Z"}
/// ```
///
/// Empty optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Owner identity.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub usr: String,
    /// Record identifier.
    pub id: String,
    /// Numeric type tag.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Sealed payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// RFC 3339 edit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// RFC 3339 merge time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<String>,
}

impl WireRecord {
    /// Converts a stored record to its wire form.
    pub fn from_record(record: &SecretRecord) -> ProtocolResult<Self> {
        let updated = record
            .updated
            .to_rfc3339()
            .map_err(|e| ProtocolError::invalid_field("updated", e.to_string()))?;
        let merged = record
            .merged
            .map(Timestamp::to_rfc3339)
            .transpose()
            .map_err(|e| ProtocolError::invalid_field("merged", e.to_string()))?;

        Ok(Self {
            usr: record.owner.clone(),
            id: record.id.clone(),
            kind: record.kind.tag(),
            data: record.data.clone(),
            updated: Some(updated),
            merged,
        })
    }

    /// Converts back to a record.
    ///
    /// An empty `usr` is kept empty; the server assigns the owner itself.
    ///
    /// # Errors
    ///
    /// Fails on an unknown type tag, a missing `updated` or an unparsable
    /// timestamp.
    pub fn into_record(self) -> ProtocolResult<SecretRecord> {
        let kind = SecretKind::try_from(self.kind)
            .map_err(|e| ProtocolError::invalid_field("type", e.to_string()))?;
        let updated = self
            .updated
            .as_deref()
            .ok_or_else(|| ProtocolError::invalid_field("updated", "missing"))
            .and_then(|text| {
                Timestamp::parse_rfc3339(text)
                    .map_err(|e| ProtocolError::invalid_field("updated", e.to_string()))
            })?;
        let merged = self
            .merged
            .as_deref()
            .map(Timestamp::parse_rfc3339)
            .transpose()
            .map_err(|e| ProtocolError::invalid_field("merged", e.to_string()))?;

        Ok(SecretRecord {
            owner: self.usr,
            id: self.id,
            kind,
            data: self.data,
            updated,
            merged,
        })
    }
}

/// Encodes records as a JSON array.
pub fn encode_records(records: &[SecretRecord]) -> ProtocolResult<Vec<u8>> {
    let wire = records
        .iter()
        .map(WireRecord::from_record)
        .collect::<ProtocolResult<Vec<_>>>()?;
    Ok(serde_json::to_vec(&wire)?)
}

/// Decodes a JSON array of records.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyBody`] for an empty (or whitespace) body,
/// [`ProtocolError::Json`] for malformed JSON and `InvalidField` for records
/// that don't convert.
pub fn decode_records(body: &[u8]) -> ProtocolResult<Vec<SecretRecord>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::EmptyBody);
    }
    let wire: Vec<WireRecord> = serde_json::from_slice(body)?;
    wire.into_iter().map(WireRecord::into_record).collect()
}
