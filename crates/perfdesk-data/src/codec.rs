//! Conversion between raw store snapshots and typed records.
//!
//! Records are stored without their own key; the key is injected as `id`
//! on the way out and stripped on the way in.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{DataError, Result};

/// Children of a collection snapshot, each with its key injected as `id`.
/// Children that are not objects cannot carry an id and are dropped.
pub fn keyed(snapshot: Option<Value>) -> Vec<Value> {
    match snapshot {
        Some(Value::Object(children)) => children
            .into_iter()
            .filter_map(|(key, value)| with_id(key, value))
            .collect(),
        _ => Vec::new(),
    }
}

/// Like [`keyed`], keeping only children whose `field` equals `expected`.
pub fn keyed_where(snapshot: Option<Value>, field: &str, expected: &Value) -> Vec<Value> {
    match snapshot {
        Some(Value::Object(children)) => children
            .into_iter()
            .filter(|(_, value)| field_matches(value, field, expected))
            .filter_map(|(key, value)| with_id(key, value))
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether `record` holds `expected` at `field`. A `/` in the field walks
/// into nested objects. A missing field never matches.
pub fn field_matches(record: &Value, field: &str, expected: &Value) -> bool {
    let mut current = record;
    for segment in field.split('/').filter(|s| !s.is_empty()) {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    current == expected
}

pub fn with_id(key: String, value: Value) -> Option<Value> {
    match value {
        Value::Object(mut fields) => {
            fields.insert("id".to_string(), Value::String(key));
            Some(Value::Object(fields))
        }
        _ => None,
    }
}

/// Decode one record read from `collection/key`.
pub fn decode<T: DeserializeOwned>(collection: &str, key: &str, value: Value) -> Result<T> {
    let value = with_id(key.to_string(), value).ok_or_else(|| DataError::Decode {
        collection: collection.to_string(),
        key: key.to_string(),
        source: serde::de::Error::custom("record is not an object"),
    })?;
    serde_json::from_value(value).map_err(|source| DataError::Decode {
        collection: collection.to_string(),
        key: key.to_string(),
        source,
    })
}

/// Decode records that already carry their `id`. Malformed records are
/// logged and skipped so one bad row cannot hide the rest of a list.
pub fn decode_list<T: DeserializeOwned>(collection: &str, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| {
            let key = record
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match serde_json::from_value(record) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(%collection, %key, error = %e, "Skipping malformed record");
                    None
                }
            }
        })
        .collect()
}

/// Encode a record for storage, without its `id`.
pub fn encode<T: Serialize>(record: &T) -> Result<Value> {
    match serde_json::to_value(record)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(Value::Object(fields))
        }
        other => Ok(other),
    }
}

/// A single-field merge payload.
pub fn single_field(field: &str, value: Value) -> Map<String, Value> {
    let mut partial = Map::new();
    partial.insert(field.to_string(), value);
    partial
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfdesk_core::types::Goal;
    use serde_json::json;

    #[test]
    fn test_keyed_injects_ids() {
        let records = keyed(Some(json!({
            "b": {"title": "two"},
            "a": {"title": "one"},
            "junk": 5
        })));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "a");
        assert_eq!(records[1]["id"], "b");
    }

    #[test]
    fn test_keyed_empty() {
        assert!(keyed(None).is_empty());
        assert!(keyed(Some(json!("scalar"))).is_empty());
    }

    #[test]
    fn test_keyed_where_missing_field_never_matches() {
        let records = keyed_where(
            Some(json!({
                "g1": {"employeeId": "e1"},
                "g2": {"title": "no owner"},
                "g3": {"employeeId": "e2"}
            })),
            "employeeId",
            &json!("e1"),
        );
        assert_eq!(records, vec![json!({"employeeId": "e1", "id": "g1"})]);
    }

    #[test]
    fn test_field_matches_nested_and_typed() {
        let record = json!({"meta": {"owner": "u1"}, "score": 3});
        assert!(field_matches(&record, "meta/owner", &json!("u1")));
        assert!(!field_matches(&record, "meta/other", &json!("u1")));
        assert!(field_matches(&record, "score", &json!(3)));
        assert!(!field_matches(&record, "score", &json!("3")));
    }

    #[test]
    fn test_decode_reports_collection_and_key() {
        let err = decode::<Goal>("goals", "g1", json!({"title": "no dates"})).unwrap_err();
        match err {
            DataError::Decode { collection, key, .. } => {
                assert_eq!(collection, "goals");
                assert_eq!(key, "g1");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_list_skips_malformed() {
        let records = vec![
            json!({
                "id": "g1",
                "employeeId": "e1",
                "title": "Ship",
                "targetDate": "2024-05-01T00:00:00.000Z",
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z"
            }),
            json!({"id": "g2", "title": "broken"}),
        ];
        let goals: Vec<Goal> = decode_list("goals", records);
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].id, "g1");
    }

    #[test]
    fn test_encode_strips_id() {
        let encoded = encode(&json!({"id": "x", "title": "t"})).unwrap();
        assert_eq!(encoded, json!({"title": "t"}));
    }
}
