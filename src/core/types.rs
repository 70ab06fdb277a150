use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A stored row or an incoming payload: a JSON object keyed by attribute name.
pub type Entity = serde_json::Map<String, JsonValue>;

/// Primary key column every store row carries.
pub const ID_FIELD: &str = "id";

/// Tag a dynamic-zone member uses to declare its component type.
pub const COMPONENT_TYPE_FIELD: &str = "__component";

/// Timestamp column that gates visibility on draft/publish content types.
pub const PUBLISHED_AT_FIELD: &str = "published_at";

/// Store-assigned identifier of a row.
///
/// Stores may hand out integer or string keys. Numeric strings coming from
/// payloads (`"12"`) are normalized to integers so that `12` and `"12"`
/// refer to the same row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Read an identifier from a bare JSON scalar.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(Self::Int),
            JsonValue::String(s) if s.is_empty() => None,
            JsonValue::String(s) => Some(
                s.parse::<i64>()
                    .map(Self::Int)
                    .unwrap_or_else(|_| Self::Str(s.clone())),
            ),
            _ => None,
        }
    }

    /// Read an identifier from a relation reference item: either a bare id
    /// or an object carrying an `id` key.
    pub fn from_reference(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(obj) => obj.get(ID_FIELD).and_then(Self::from_value),
            other => Self::from_value(other),
        }
    }

    /// Identifier of a stored row, if it has one.
    pub fn of(entity: &Entity) -> Option<Self> {
        entity.get(ID_FIELD).and_then(Self::from_value)
    }

    pub fn to_value(&self) -> JsonValue {
        match self {
            Self::Int(i) => JsonValue::from(*i),
            Self::Str(s) => JsonValue::String(s.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        id.parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Str(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings_normalize_to_integers() {
        assert_eq!(EntityId::from_value(&json!("12")), Some(EntityId::Int(12)));
        assert_eq!(EntityId::from_value(&json!(12)), Some(EntityId::Int(12)));
        assert_eq!(
            EntityId::from_value(&json!("abc")),
            Some(EntityId::Str("abc".into()))
        );
    }

    #[test]
    fn test_reference_objects_and_rejects() {
        assert_eq!(EntityId::from_reference(&json!({"id": 3})), Some(EntityId::Int(3)));
        assert_eq!(EntityId::from_reference(&json!({"name": "x"})), None);
        assert_eq!(EntityId::from_value(&json!(1.5)), None);
        assert_eq!(EntityId::from_value(&json!(true)), None);
        assert_eq!(EntityId::from_value(&json!("")), None);
    }
}
