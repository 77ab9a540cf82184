//! Canonical trace events.
//!
//! A canonical event has the fixed top-level key order
//! `v, type, i, t?, mu?, meta?`. Optional keys whose value is null are
//! dropped, unknown keys are ignored, and `mu`/`meta` are sorted at every
//! level. Canonicalizing an already-canonical event is a no-op.
//!
//! A trace is a sequence of events whose `i` runs 0..n-1 in order. Gaps and
//! reordering are reported, never repaired.

use crate::canonical::json_from_str;
use crate::errors::{RcxError, Result};
use crate::value::Value;
use serde::Serialize;
use serde_json::Value as Json;

pub const TRACE_EVENT_V1: u64 = 1;
pub const TRACE_EVENT_V2: u64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonEvent {
    pub v: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub i: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mu: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl CanonEvent {
    /// Compact JSON with the fixed key order.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// String field of `mu`, if present.
    pub fn mu_str(&self, key: &str) -> Option<&str> {
        match &self.mu {
            Some(Value::Map(map)) => map.get(key).and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Validate and canonicalize one raw event.
///
/// `v` defaults to 1 when absent.
///
/// # Errors
///
/// Returns `SchemaViolation` naming the offending field.
pub fn canon_event(raw: &Json) -> Result<CanonEvent> {
    let Json::Object(fields) = raw else {
        return Err(RcxError::schema("event must be an object"));
    };

    let v = match fields.get("v") {
        None => TRACE_EVENT_V1,
        Some(v) => match v.as_u64() {
            Some(n @ (TRACE_EVENT_V1 | TRACE_EVENT_V2)) => n,
            _ => {
                return Err(RcxError::schema(format!(
                    "event.v must be {} or {}, got {}",
                    TRACE_EVENT_V1, TRACE_EVENT_V2, v
                )))
            }
        },
    };

    let kind = match fields.get("type") {
        Some(Json::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(RcxError::schema("event.type must be a non-empty string")),
    };

    let i = fields
        .get("i")
        .and_then(Json::as_u64)
        .ok_or_else(|| RcxError::schema("event.i must be an integer >= 0"))?;

    let t = match fields.get("t") {
        None | Some(Json::Null) => None,
        Some(Json::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(_) => {
            return Err(RcxError::schema(
                "event.t must be a non-empty string when provided",
            ))
        }
    };

    let mu = match fields.get("mu") {
        None | Some(Json::Null) => None,
        Some(mu) => Some(Value::from_json(mu)?),
    };

    let meta = match fields.get("meta") {
        None | Some(Json::Null) => None,
        Some(meta @ Json::Object(_)) => Some(Value::from_json(meta)?),
        Some(_) => {
            return Err(RcxError::schema(
                "event.meta must be an object when provided",
            ))
        }
    };

    Ok(CanonEvent {
        v,
        kind,
        i,
        t,
        mu,
        meta,
    })
}

/// Canonicalize a sequence and check `i` is contiguous from zero.
///
/// # Errors
///
/// Returns `SchemaViolation` for a bad event or a gap/reordering in `i`.
pub fn canon_events(raw: &[Json]) -> Result<Vec<CanonEvent>> {
    let events = raw.iter().map(canon_event).collect::<Result<Vec<_>>>()?;
    check_contiguous(&events)?;
    Ok(events)
}

/// # Errors
///
/// Returns `SchemaViolation` at the first event whose `i` is out of place.
pub fn check_contiguous(events: &[CanonEvent]) -> Result<()> {
    for (expected, event) in events.iter().enumerate() {
        if event.i != expected as u64 {
            return Err(RcxError::schema(format!(
                "event.i must be contiguous 0..n-1 in order; position {} has i={}",
                expected, event.i
            )));
        }
    }
    Ok(())
}

/// Serialize canonical events as JSONL, one event per newline-terminated line.
///
/// # Errors
///
/// Returns `Serialization` if encoding fails.
pub fn to_jsonl(events: &[CanonEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_json_line()?);
        out.push('\n');
    }
    Ok(out)
}

/// Canonicalize raw events and serialize them as JSONL.
///
/// # Errors
///
/// See [`canon_events`].
pub fn canon_jsonl(raw: &[Json]) -> Result<String> {
    to_jsonl(&canon_events(raw)?)
}

/// Parse JSONL text into raw event objects, skipping blank lines.
///
/// # Errors
///
/// Returns `SchemaViolation` with the 1-based line number for invalid JSON or
/// a line that is not an object.
pub fn read_jsonl(text: &str) -> Result<Vec<Json>> {
    let mut events = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Json = json_from_str(line)
            .map_err(|e| RcxError::schema(format!("line {}: invalid JSON: {}", index + 1, e)))?;
        if !value.is_object() {
            return Err(RcxError::schema(format!(
                "line {}: expected an object per line",
                index + 1
            )));
        }
        events.push(value);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_and_dropped_fields() {
        let raw = json!({
            "meta": {"z": 1, "a": {"y": 2, "b": 3}},
            "extra": "ignored",
            "t": null,
            "i": 0,
            "type": "demo",
            "v": 1
        });
        let line = canon_event(&raw).unwrap().to_json_line().unwrap();
        assert_eq!(
            line,
            r#"{"v":1,"type":"demo","i":0,"meta":{"a":{"b":3,"y":2},"z":1}}"#
        );
    }

    #[test]
    fn test_v_defaults_to_one() {
        let event = canon_event(&json!({"type": "x", "i": 0})).unwrap();
        assert_eq!(event.v, TRACE_EVENT_V1);
    }

    #[test]
    fn test_field_validation() {
        for raw in [
            json!({"v": 3, "type": "x", "i": 0}),
            json!({"type": "  ", "i": 0}),
            json!({"type": "x", "i": -1}),
            json!({"type": "x", "i": 0, "t": ""}),
            json!({"type": "x", "i": 0, "meta": [1]}),
            json!([1, 2]),
        ] {
            assert!(
                matches!(canon_event(&raw), Err(RcxError::SchemaViolation { .. })),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_contiguity_is_checked_not_repaired() {
        let raw = vec![json!({"type": "a", "i": 0}), json!({"type": "b", "i": 2})];
        assert!(canon_events(&raw).is_err());
        let swapped = vec![json!({"type": "a", "i": 1}), json!({"type": "b", "i": 0})];
        assert!(canon_events(&swapped).is_err());
    }

    #[test]
    fn test_jsonl_is_newline_terminated() {
        let raw = vec![json!({"type": "a", "i": 0}), json!({"type": "b", "i": 1})];
        let text = canon_jsonl(&raw).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 2);
        assert_eq!(canon_jsonl(&[]).unwrap(), "");
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        let raw = vec![json!({"i": 0, "type": "a", "mu": {"b": [{"d": 1, "c": 2}], "a": null}})];
        let once = canon_jsonl(&raw).unwrap();
        let reread = read_jsonl(&once).unwrap();
        assert_eq!(canon_jsonl(&reread).unwrap(), once);
    }

    #[test]
    fn test_read_jsonl_reports_line() {
        let err = read_jsonl("{\"i\":0}\n\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert!(read_jsonl("[1]\n").is_err());
    }
}
