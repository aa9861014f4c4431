//! Secret record data model.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whole seconds since the Unix epoch.
///
/// Sub-second precision is never stored. [`Timestamp::ZERO`] doubles as the
/// "nothing ingested yet" watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The epoch; the watermark of an owner with no merged records.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Creates a timestamp from seconds since the epoch.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Timestamp(secs)
    }

    /// Returns seconds since the epoch.
    #[must_use]
    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// Current wall-clock time, truncated to whole seconds.
    #[must_use]
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp())
    }

    /// The next representable second.
    #[must_use]
    pub fn next(self) -> Self {
        Timestamp(self.0.saturating_add(1))
    }

    /// Formats as RFC 3339 in UTC with second precision.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is outside chrono's representable range.
    pub fn to_rfc3339(self) -> StoreResult<String> {
        DateTime::<Utc>::from_timestamp(self.0, 0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .ok_or_else(|| StoreError::invalid(format!("timestamp {} out of range", self.0)))
    }

    /// Parses an RFC 3339 string, dropping any fractional seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid RFC 3339.
    pub fn parse_rfc3339(text: &str) -> StoreResult<Self> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| Timestamp(dt.timestamp()))
            .map_err(|e| StoreError::invalid(format!("bad timestamp {text:?}: {e}")))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of secret types.
///
/// The numeric tags are what goes on the wire and into storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SecretKind {
    /// Website login and password.
    Credential = 1,
    /// Free-form text note.
    Text = 2,
    /// Named binary blob.
    File = 3,
    /// Bank card details.
    Card = 4,
}

impl SecretKind {
    /// All kinds in tag order.
    pub const ALL: [SecretKind; 4] = [
        SecretKind::Credential,
        SecretKind::Text,
        SecretKind::File,
        SecretKind::Card,
    ];

    /// Returns the numeric tag.
    #[must_use]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Human-readable name, as shown in listings.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SecretKind::Credential => "credential",
            SecretKind::Text => "text",
            SecretKind::File => "file",
            SecretKind::Card => "card",
        }
    }
}

impl TryFrom<u8> for SecretKind {
    type Error = StoreError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(SecretKind::Credential),
            2 => Ok(SecretKind::Text),
            3 => Ok(SecretKind::File),
            4 => Ok(SecretKind::Card),
            other => Err(StoreError::invalid(format!("unknown secret type tag {other}"))),
        }
    }
}

impl From<SecretKind> for u8 {
    fn from(kind: SecretKind) -> u8 {
        kind.tag()
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One encrypted secret belonging to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Owner identity.
    pub owner: String,
    /// User-chosen identifier, unique per owner.
    pub id: String,
    /// Type tag.
    pub kind: SecretKind,
    /// Sealed payload (hex ciphertext). Stores never look inside.
    pub data: String,
    /// When the writer produced this version.
    pub updated: Timestamp,
    /// When the authority accepted this version; `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<Timestamp>,
}

impl SecretRecord {
    /// Creates an unmerged record.
    pub fn new(
        owner: impl Into<String>,
        id: impl Into<String>,
        kind: SecretKind,
        data: impl Into<String>,
        updated: Timestamp,
    ) -> Self {
        Self {
            owner: owner.into(),
            id: id.into(),
            kind,
            data: data.into(),
            updated,
            merged: None,
        }
    }

    /// Sets the merge stamp.
    #[must_use]
    pub fn with_merged(mut self, merged: Timestamp) -> Self {
        self.merged = Some(merged);
        self
    }

    /// Returns true if the authority has not accepted this version yet.
    #[must_use]
    pub fn is_unmerged(&self) -> bool {
        self.merged.is_none()
    }

    /// Checks the fields every store requires.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the owner or id is empty.
    pub fn validate(&self) -> StoreResult<()> {
        if self.owner.is_empty() {
            return Err(StoreError::invalid("owner must not be empty"));
        }
        if self.id.is_empty() {
            return Err(StoreError::invalid("id must not be empty"));
        }
        Ok(())
    }

    /// Listing row for this record.
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            kind: self.kind,
            updated: self.updated,
        }
    }
}

/// Index row: what a listing shows without decrypting anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Record identifier.
    pub id: String,
    /// Type tag.
    pub kind: SecretKind,
    /// Last edit time.
    pub updated: Timestamp,
}

/// Result of a conditional upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; the incoming one was stored and stamped.
    Inserted,
    /// The incoming record was newer and replaced the stored one.
    Updated,
    /// The stored record was at least as new; nothing changed.
    Rejected,
}

impl UpsertOutcome {
    /// Returns true if the store changed.
    #[must_use]
    pub fn is_write(self) -> bool {
        !matches!(self, UpsertOutcome::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_roundtrip_at_second_precision() {
        let ts = Timestamp::from_secs(1_700_000_000);
        let text = ts.to_rfc3339().unwrap();
        assert_eq!(text, "2023-11-14T22:13:20Z");
        assert_eq!(Timestamp::parse_rfc3339(&text).unwrap(), ts);
    }

    #[test]
    fn rfc3339_parse_drops_fraction_and_honours_offset() {
        let ts = Timestamp::parse_rfc3339("2023-11-14T23:13:20.987+01:00").unwrap();
        assert_eq!(ts, Timestamp::from_secs(1_700_000_000));
    }

    #[test]
    fn rfc3339_parse_rejects_garbage() {
        assert!(Timestamp::parse_rfc3339("yesterday").is_err());
    }

    #[test]
    fn kind_tags() {
        for kind in SecretKind::ALL {
            assert_eq!(SecretKind::try_from(kind.tag()).unwrap(), kind);
        }
        assert!(SecretKind::try_from(0).is_err());
        assert!(SecretKind::try_from(5).is_err());
    }

    #[test]
    fn kind_serializes_as_number() {
        assert_eq!(serde_json::to_string(&SecretKind::Card).unwrap(), "4");
        assert_eq!(
            serde_json::from_str::<SecretKind>("2").unwrap(),
            SecretKind::Text
        );
        assert!(serde_json::from_str::<SecretKind>("9").is_err());
    }

    #[test]
    fn unmerged_record_omits_merged() {
        let record = SecretRecord::new("alice", "n1", SecretKind::Text, "ab", Timestamp::from_secs(5));
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("merged"));

        let back: SecretRecord = serde_json::from_str(&json).unwrap();
        assert!(back.is_unmerged());
    }

    #[test]
    fn validate_rejects_empty_keys() {
        let mut record = SecretRecord::new("alice", "", SecretKind::Text, "", Timestamp::ZERO);
        assert!(record.validate().is_err());
        record.id = "x".into();
        assert!(record.validate().is_ok());
        record.owner.clear();
        assert!(record.validate().is_err());
    }
}
