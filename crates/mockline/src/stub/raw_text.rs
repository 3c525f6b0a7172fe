//! Serde helpers for pattern fields that accept either a JSON string or an
//! inline JSON document. Both forms are normalised to text.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn optional<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(into_text))
}

pub fn required<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional(deserializer).map(Option::unwrap_or_default)
}

fn into_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
