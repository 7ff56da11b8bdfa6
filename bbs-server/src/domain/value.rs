//! # Tagged Value
//!
//! The "any" payload shared between apps, sessions, and `Store`'s key-value
//! collection is a typed variant, not a raw JSON blob threaded through the
//! whole call stack: string, number, boolean, list-of-value, map-of-value.
//! `serde_json` is only the wire/storage codec at the `Store` boundary,
//! per the design note in §9 ("Shared 'any' payloads ... JSON codec at the
//! storage boundary").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Heuristic used by [`crate::service::capability::CapabilityFacade::storage`]'s
    /// `set`: a string value containing code-like substrings is refused.
    /// Function-typed values are refused outright by construction - there is
    /// no callable variant in this enum.
    pub fn looks_code_like(&self) -> bool {
        const MARKERS: &[&str] = &["function", "=>", "eval", "new Function"];
        match self {
            Value::String(s) => MARKERS.iter().any(|m| s.contains(m)),
            Value::List(items) => items.iter().any(Value::looks_code_like),
            Value::Map(map) => map.values().any(Value::looks_code_like),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => serde_json::Value::Array(items.into_iter().map(Into::into).collect()),
            Value::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_serde_json() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::Number(1.0));
        map.insert("b".to_string(), Value::List(vec![Value::Bool(true), Value::Null]));
        let original = Value::Map(map);

        let json: serde_json::Value = original.clone().into();
        let back: Value = json.into();
        assert_eq!(original, back);
    }

    #[test]
    fn detects_code_like_strings() {
        assert!(Value::String("function() { return 1 }".to_string()).looks_code_like());
        assert!(Value::String("x => x + 1".to_string()).looks_code_like());
        assert!(Value::String("eval('1')".to_string()).looks_code_like());
        assert!(!Value::String("hello world".to_string()).looks_code_like());
    }

    #[test]
    fn detects_code_like_nested_in_collections() {
        let nested = Value::List(vec![Value::String("safe".into()), Value::String("new Function()".into())]);
        assert!(nested.looks_code_like());
    }
}
