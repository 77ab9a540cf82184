//! The closed value model.
//!
//! A [`Value`] is an atom (null, boolean, number, string/symbol) or a node
//! (ordered sequence, or string-keyed mapping). Mappings are `BTreeMap`s so
//! every traversal of their keys is sorted. Numbers are `serde_json::Number`,
//! which cannot hold NaN or infinities; floats are still checked at every
//! constructor that accepts an `f64`.
//!
//! Conversions to and from `serde_json::Value` walk an explicit stack, so
//! ingesting deeply nested input never grows the host call stack.

use crate::errors::{RcxError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Key of the reserved variable-site shape `{"var": name}`.
pub const VAR_KEY: &str = "var";

/// Variable name that matches anything without binding.
pub const WILDCARD: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// A symbol atom. Symbols and strings share one representation.
    pub fn sym(name: impl Into<String>) -> Self {
        Value::Str(name.into())
    }

    pub fn int(n: i64) -> Self {
        Value::Number(Number::from(n))
    }

    /// A float atom.
    ///
    /// # Errors
    ///
    /// Returns `MalformedValue` for NaN and infinities.
    pub fn float(f: f64) -> Result<Self> {
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| RcxError::malformed(format!("non-finite number {}", f)))
    }

    /// A variable site `{"var": name}`.
    pub fn var(name: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(VAR_KEY.to_string(), Value::Str(name.into()));
        Value::Map(map)
    }

    pub fn wildcard() -> Self {
        Value::var(WILDCARD)
    }

    pub fn seq(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Seq(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Name of the variable site, if this value is one.
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Value::Map(map) if map.len() == 1 => match map.get(VAR_KEY) {
                Some(Value::Str(name)) => Some(name.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_var() == Some(WILDCARD)
    }

    pub fn is_atom(&self) -> bool {
        !matches!(self, Value::Seq(_) | Value::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Number of direct children (0 for atoms).
    pub fn width(&self) -> usize {
        match self {
            Value::Seq(items) => items.len(),
            Value::Map(map) => map.len(),
            _ => 0,
        }
    }

    /// Nesting depth: atoms are 0, a flat sequence or mapping is 1.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((value, level)) = stack.pop() {
            match value {
                Value::Seq(items) => {
                    max = max.max(level + 1);
                    stack.extend(items.iter().map(|child| (child, level + 1)));
                }
                Value::Map(map) => {
                    max = max.max(level + 1);
                    stack.extend(map.values().map(|child| (child, level + 1)));
                }
                _ => {}
            }
        }
        max
    }

    /// Validate and convert a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `MalformedValue` if a number is not finite.
    pub fn from_json(json: &Json) -> Result<Self> {
        enum Frame<'a> {
            Seq {
                rest: std::slice::Iter<'a, Json>,
                out: Vec<Value>,
            },
            Map {
                rest: serde_json::map::Iter<'a>,
                key: Option<String>,
                out: BTreeMap<String, Value>,
            },
        }

        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut pending = Some(json);
        let mut carry: Option<Value> = None;

        loop {
            if let Some(node) = pending.take() {
                match node {
                    Json::Array(items) => stack.push(Frame::Seq {
                        rest: items.iter(),
                        out: Vec::with_capacity(items.len()),
                    }),
                    Json::Object(map) => stack.push(Frame::Map {
                        rest: map.iter(),
                        key: None,
                        out: BTreeMap::new(),
                    }),
                    Json::Null => carry = Some(Value::Null),
                    Json::Bool(b) => carry = Some(Value::Bool(*b)),
                    Json::String(s) => carry = Some(Value::Str(s.clone())),
                    Json::Number(n) => {
                        if n.as_f64().is_some_and(|f| !f.is_finite()) {
                            return Err(RcxError::malformed(format!("non-finite number {}", n)));
                        }
                        carry = Some(Value::Number(n.clone()));
                    }
                }
            }

            let Some(frame) = stack.last_mut() else {
                return carry.ok_or_else(|| RcxError::malformed("empty input"));
            };

            match frame {
                Frame::Seq { rest, out } => {
                    if let Some(done) = carry.take() {
                        out.push(done);
                    }
                    match rest.next() {
                        Some(child) => pending = Some(child),
                        None => carry = Some(Value::Seq(std::mem::take(out))),
                    }
                }
                Frame::Map { rest, key, out } => {
                    if let (Some(done), Some(k)) = (carry.take(), key.take()) {
                        out.insert(k, done);
                    }
                    match rest.next() {
                        Some((k, child)) => {
                            *key = Some(k.clone());
                            pending = Some(child);
                        }
                        None => carry = Some(Value::Map(std::mem::take(out))),
                    }
                }
            }

            if pending.is_none() && carry.is_some() {
                stack.pop();
            }
        }
    }

    /// Convert to a JSON value. Map keys come out sorted.
    pub fn to_json(&self) -> Json {
        enum Frame<'a> {
            Seq {
                rest: std::slice::Iter<'a, Value>,
                out: Vec<Json>,
            },
            Map {
                rest: btree_map::Iter<'a, String, Value>,
                key: Option<String>,
                out: JsonMap<String, Json>,
            },
        }

        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut pending = Some(self);
        let mut carry: Option<Json> = None;

        loop {
            if let Some(node) = pending.take() {
                match node {
                    Value::Seq(items) => stack.push(Frame::Seq {
                        rest: items.iter(),
                        out: Vec::with_capacity(items.len()),
                    }),
                    Value::Map(map) => stack.push(Frame::Map {
                        rest: map.iter(),
                        key: None,
                        out: JsonMap::new(),
                    }),
                    Value::Null => carry = Some(Json::Null),
                    Value::Bool(b) => carry = Some(Json::Bool(*b)),
                    Value::Number(n) => carry = Some(Json::Number(n.clone())),
                    Value::Str(s) => carry = Some(Json::String(s.clone())),
                }
            }

            let Some(frame) = stack.last_mut() else {
                return carry.unwrap_or(Json::Null);
            };

            match frame {
                Frame::Seq { rest, out } => {
                    if let Some(done) = carry.take() {
                        out.push(done);
                    }
                    match rest.next() {
                        Some(child) => pending = Some(child),
                        None => carry = Some(Json::Array(std::mem::take(out))),
                    }
                }
                Frame::Map { rest, key, out } => {
                    if let (Some(done), Some(k)) = (carry.take(), key.take()) {
                        out.insert(k, done);
                    }
                    match rest.next() {
                        Some((k, child)) => {
                            *key = Some(k.clone());
                            pending = Some(child);
                        }
                        None => carry = Some(Json::Object(std::mem::take(out))),
                    }
                }
            }

            if pending.is_none() && carry.is_some() {
                stack.pop();
            }
        }
    }

    /// Parse JSON text into a validated value.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for invalid JSON and `MalformedValue` for
    /// values outside the model.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: Json = crate::canonical::json_from_str(text)?;
        Value::from_json(&json)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Value::from_json(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_float_rejects_non_finite() {
        assert!(Value::float(f64::NAN).is_err());
        assert!(Value::float(f64::INFINITY).is_err());
        assert!(Value::float(f64::NEG_INFINITY).is_err());
        assert!(Value::float(2.5).is_ok());
    }

    #[test]
    fn test_var_site_shape() {
        let v = Value::var("x");
        assert_eq!(v.as_var(), Some("x"));
        assert!(!v.is_wildcard());
        assert!(Value::wildcard().is_wildcard());

        let not_var = Value::map([("var", Value::int(1))]);
        assert_eq!(not_var.as_var(), None);
        let extra_key = Value::map([("var", Value::sym("x")), ("y", Value::Null)]);
        assert_eq!(extra_key.as_var(), None);
    }

    #[test]
    fn test_json_conversion_preserves_structure() {
        let json = json!({"b": [1, "two", null, true], "a": {"nested": 2.5}});
        let value = Value::from_json(&json).unwrap();
        assert_eq!(value.to_json(), json);
        assert_eq!(value.depth(), 2);
        assert_eq!(value.width(), 2);
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        let int = Value::from_json(&json!(1)).unwrap();
        let float = Value::from_json(&json!(1.0)).unwrap();
        assert_ne!(int, float);
    }

    #[test]
    fn test_deep_nesting_converts_without_recursion() {
        let mut value = Value::Null;
        for _ in 0..2000 {
            value = Value::seq([value]);
        }
        let json = value.to_json();
        let back = Value::from_json(&json).unwrap();
        assert_eq!(back.depth(), 2000);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(Value::from_json(&json!([])).unwrap(), Value::Seq(vec![]));
        assert_eq!(
            Value::from_json(&json!({})).unwrap(),
            Value::Map(BTreeMap::new())
        );
        assert_eq!(Value::seq([]).depth(), 1);
        assert_eq!(Value::Null.depth(), 0);
    }

    #[test]
    fn test_serde_roundtrip_through_text() {
        let value = Value::seq([Value::sym("PING"), Value::var("x")]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"["PING",{"var":"x"}]"#);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }
}
