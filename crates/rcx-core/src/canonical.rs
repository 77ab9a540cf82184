//! Canonical serialization and content hashing.
//!
//! Canonical JSON has sorted keys at every level and no insignificant
//! whitespace. The content hash of a value is the lowercase hex SHA-256 of its
//! canonical JSON bytes; the short form is the first 16 hex characters.

use crate::errors::Result;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the short hash used in trace payloads and loop detection.
pub const SHORT_HASH_LEN: usize = 16;

/// Serialize a value to canonical JSON.
///
/// # Errors
///
/// Returns `Serialization` if a string cannot be encoded.
pub fn canonical_json(value: &Value) -> Result<String> {
    enum Emit<'a> {
        Value(&'a Value),
        Key(&'a str),
        Raw(&'static str),
    }

    let mut out = String::new();
    let mut stack = vec![Emit::Value(value)];

    while let Some(item) = stack.pop() {
        match item {
            Emit::Raw(text) => out.push_str(text),
            Emit::Key(key) => {
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
            }
            Emit::Value(node) => match node {
                Value::Null => out.push_str("null"),
                Value::Bool(true) => out.push_str("true"),
                Value::Bool(false) => out.push_str("false"),
                Value::Number(n) => out.push_str(&n.to_string()),
                Value::Str(s) => out.push_str(&serde_json::to_string(s)?),
                Value::Seq(items) => {
                    out.push('[');
                    stack.push(Emit::Raw("]"));
                    for (i, child) in items.iter().enumerate().rev() {
                        stack.push(Emit::Value(child));
                        if i > 0 {
                            stack.push(Emit::Raw(","));
                        }
                    }
                }
                Value::Map(map) => {
                    out.push('{');
                    stack.push(Emit::Raw("}"));
                    for (i, (key, child)) in map.iter().enumerate().rev() {
                        stack.push(Emit::Value(child));
                        stack.push(Emit::Key(key));
                        if i > 0 {
                            stack.push(Emit::Raw(","));
                        }
                    }
                }
            },
        }
    }

    Ok(out)
}

/// Parse JSON text with no fixed nesting limit.
///
/// `serde_json` stops at 128 levels, well below [`crate::Limits::max_depth`],
/// which would make deep but legal values impossible to read back. The
/// parser's own stack grows on the heap instead; callers bound depth by
/// validating the result against their limits.
///
/// # Errors
///
/// Returns the parser error for invalid JSON or trailing characters.
pub fn json_from_str<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Canonical JSON of an arbitrary JSON document (keys sorted at every level).
///
/// # Errors
///
/// Returns `MalformedValue` or `Serialization` if the document is outside the
/// value model.
pub fn canonical_json_of(json: &serde_json::Value) -> Result<String> {
    canonical_json(&Value::from_json(json)?)
}

/// Lowercase hex SHA-256 of the given bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Full content hash of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// # Errors
    ///
    /// Returns `Serialization` if canonical JSON cannot be produced.
    pub fn of(value: &Value) -> Result<Self> {
        Ok(Self(sha256_hex(canonical_json(value)?.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..SHORT_HASH_LEN.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short content hash of a value.
///
/// # Errors
///
/// Returns `Serialization` if canonical JSON cannot be produced.
pub fn value_hash(value: &Value) -> Result<String> {
    Ok(ContentHash::of(value)?.short().to_string())
}
