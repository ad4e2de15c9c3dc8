//! Persisted document format

use crate::{AlertLedger, StorageError};
use alerting::AlertState;
use row_normalizer::EntityId;
use serde_json::{Map, Value};
use tracing::warn;

/// Parse a stored document. Anything but a JSON object is corrupt; individual
/// entries that cannot be understood load as `AlertState::None`.
pub fn decode(location: &str, text: &str) -> Result<AlertLedger, StorageError> {
    let document: Value = serde_json::from_str(text).map_err(|e| StorageError::Corrupt {
        location: location.to_string(),
        reason: e.to_string(),
    })?;

    let entries = match document {
        Value::Object(entries) => entries,
        other => {
            return Err(StorageError::Corrupt {
                location: location.to_string(),
                reason: format!("expected a JSON object, found {}", kind(&other)),
            })
        }
    };

    let mut ledger = AlertLedger::new();
    for (key, value) in entries {
        let Some(entity) = EntityId::parse(&key) else {
            warn!("Ignoring blank entity key in {}", location);
            continue;
        };

        let state = match &value {
            Value::String(raw) => AlertState::from_stored(raw),
            Value::Null => Some(AlertState::None),
            _ => None,
        };

        match state {
            Some(AlertState::None) => {}
            Some(state) => {
                ledger.insert(entity, state);
            }
            None => warn!(
                entity = %entity,
                value = %value,
                "Unknown stored alert state, treating entity as never announced"
            ),
        }
    }

    Ok(ledger)
}

/// Render the ledger as a pretty JSON object, omitting `None` entries
pub fn encode(ledger: &AlertLedger) -> Result<String, StorageError> {
    let entries: Map<String, Value> = ledger
        .iter()
        .filter_map(|(entity, state)| {
            state
                .as_stored()
                .map(|stored| (entity.to_string(), Value::String(stored.to_string())))
        })
        .collect();

    serde_json::to_string_pretty(&Value::Object(entries))
        .map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    #[test]
    fn test_decode_known_states() {
        let ledger = decode("test", r#"{"7": "alerted", "12": "RESOLVED"}"#).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[&id("7")], AlertState::Alerted);
        assert_eq!(ledger[&id("12")], AlertState::Resolved);
    }

    #[test]
    fn test_decode_tolerates_unknown_entries() {
        let ledger = decode(
            "test",
            r#"{"7": "alerted", "8": "escalated", "9": null, "10": true, " ": "alerted"}"#,
        )
        .unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&id("8")), None);
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        for text in ["", "{", "[]", "\"alerted\"", "42"] {
            assert!(
                matches!(decode("test", text), Err(StorageError::Corrupt { .. })),
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_encode_skips_none() {
        let mut ledger = AlertLedger::new();
        ledger.insert(id("7"), AlertState::Alerted);
        ledger.insert(id("8"), AlertState::None);

        let text = encode(&ledger).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, serde_json::json!({ "7": "alerted" }));
    }
}
