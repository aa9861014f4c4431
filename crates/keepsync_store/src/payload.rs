//! Plaintext payload shapes.
//!
//! A payload is serialized to JSON and sealed before it becomes a record's
//! `data`. Stores never see these types; the client facade does.

use crate::error::{StoreError, StoreResult};
use crate::model::SecretKind;
use serde::{Deserialize, Serialize};

/// Website login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Site the login belongs to.
    pub website: String,
    /// User name.
    pub login: String,
    /// Password.
    pub pass: String,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// Text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    /// The text itself.
    pub data: String,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// Named binary blob, carried as text (base64 or similar, chosen by the caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlob {
    /// Original file name.
    pub name: String,
    /// Encoded content.
    pub data: String,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// Bank card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Issuing bank.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bank: String,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    /// Card number.
    pub num: u64,
    /// Security code.
    pub cvv: u32,
    /// Expiry as `MMYY`.
    pub exp: u32,
}

/// Any plaintext payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Website login.
    Credential(Credential),
    /// Text note.
    Text(Text),
    /// Named blob.
    File(FileBlob),
    /// Bank card.
    Card(Card),
}

impl Payload {
    /// Type tag for the record that will carry this payload.
    #[must_use]
    pub fn kind(&self) -> SecretKind {
        match self {
            Payload::Credential(_) => SecretKind::Credential,
            Payload::Text(_) => SecretKind::Text,
            Payload::File(_) => SecretKind::File,
            Payload::Card(_) => SecretKind::Card,
        }
    }

    /// Checks field-level constraints.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` for a card number failing the Luhn check.
    pub fn validate(&self) -> StoreResult<()> {
        if let Payload::Card(card) = self {
            if !luhn_valid(card.num) {
                return Err(StoreError::invalid("card number fails Luhn check"));
            }
        }
        Ok(())
    }

    /// Serializes to the JSON text that gets sealed.
    pub fn to_json(&self) -> StoreResult<String> {
        let text = match self {
            Payload::Credential(p) => serde_json::to_string(p),
            Payload::Text(p) => serde_json::to_string(p),
            Payload::File(p) => serde_json::to_string(p),
            Payload::Card(p) => serde_json::to_string(p),
        };
        text.map_err(|e| StoreError::invalid(e.to_string()))
    }

    /// Parses opened JSON text according to the record's kind.
    pub fn from_json(kind: SecretKind, json: &str) -> StoreResult<Self> {
        let parsed = match kind {
            SecretKind::Credential => serde_json::from_str(json).map(Payload::Credential),
            SecretKind::Text => serde_json::from_str(json).map(Payload::Text),
            SecretKind::File => serde_json::from_str(json).map(Payload::File),
            SecretKind::Card => serde_json::from_str(json).map(Payload::Card),
        };
        parsed.map_err(|e| StoreError::invalid(format!("{kind} payload: {e}")))
    }
}

/// Luhn checksum over the decimal digits of `num`.
#[must_use]
pub fn luhn_valid(num: u64) -> bool {
    if num == 0 {
        return false;
    }
    let mut sum = 0u64;
    let mut rest = num;
    let mut double = false;
    while rest > 0 {
        let mut digit = rest % 10;
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
        rest /= 10;
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_known_numbers() {
        assert!(luhn_valid(4_111_111_111_111_111));
        assert!(luhn_valid(5_555_555_555_554_444));
        assert!(luhn_valid(79_927_398_713));
        assert!(!luhn_valid(4_111_111_111_111_112));
        assert!(!luhn_valid(79_927_398_710));
        assert!(!luhn_valid(0));
    }

    #[test]
    fn card_validation() {
        let mut card = Card {
            bank: "Acme".into(),
            note: String::new(),
            num: 4_111_111_111_111_111,
            cvv: 123,
            exp: 1229,
        };
        assert!(Payload::Card(card.clone()).validate().is_ok());
        card.num += 1;
        assert!(Payload::Card(card).validate().is_err());
    }

    #[test]
    fn json_roundtrip_by_kind() {
        let payload = Payload::Credential(Credential {
            website: "example.com".into(),
            login: "alice".into(),
            pass: "hunter2".into(),
            note: String::new(),
        });
        let json = payload.to_json().unwrap();
        // Empty note is omitted
        assert!(!json.contains("note"));
        assert_eq!(Payload::from_json(SecretKind::Credential, &json).unwrap(), payload);
    }

    #[test]
    fn from_json_with_wrong_kind_fails() {
        let json = r#"{"data":"hello"}"#;
        assert!(Payload::from_json(SecretKind::Text, json).is_ok());
        assert!(Payload::from_json(SecretKind::File, json).is_err());
    }
}
