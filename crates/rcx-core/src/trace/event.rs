use crate::canonical::ContentHash;
use crate::classify::Bucket;
use crate::errors::Result;
use crate::trace::canon::{CanonEvent, TRACE_EVENT_V1};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of canonical event types derived from kernel steps.
pub const KERNEL_EVENT_PREFIX: &str = "kernel.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepPhase {
    /// A projection rewrote the value.
    Fix,
    /// A projection matched but its body referenced an unbound variable.
    Stall,
    /// No projection applied; the value was classified.
    Closure,
}

impl StepPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            StepPhase::Fix => "fix",
            StepPhase::Stall => "stall",
            StepPhase::Closure => "closure",
        }
    }
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatch step.
///
/// `payload` is the value after the step (the unchanged value for stalls and
/// closures) and `content_hash` its full hash. Field order is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceEvent {
    pub step_index: u64,
    pub phase: StepPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Bucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_id: Option<String>,
    pub payload: Value,
    pub content_hash: String,
}

impl TraceEvent {
    /// # Errors
    ///
    /// Returns `Serialization` if the payload cannot be hashed.
    pub fn new(
        step_index: u64,
        phase: StepPhase,
        route: Option<Bucket>,
        projection_id: Option<String>,
        payload: Value,
    ) -> Result<Self> {
        let content_hash = ContentHash::of(&payload)?.as_str().to_string();
        Ok(Self {
            step_index,
            phase,
            route,
            projection_id,
            payload,
            content_hash,
        })
    }

    /// True when `content_hash` still matches `payload`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the payload cannot be hashed.
    pub fn hash_matches(&self) -> Result<bool> {
        Ok(ContentHash::of(&self.payload)?.as_str() == self.content_hash)
    }

    /// The v1 canonical event for this step: `type` is `kernel.<phase>`, `t`
    /// the projection id (or the bucket for a closure).
    pub fn to_canon(&self) -> CanonEvent {
        let mut mu = BTreeMap::new();
        mu.insert("content_hash".to_string(), Value::sym(self.content_hash.as_str()));
        mu.insert("payload".to_string(), self.payload.clone());
        if let Some(route) = self.route {
            mu.insert("route".to_string(), Value::sym(route.as_str()));
        }

        let tag = self
            .projection_id
            .clone()
            .or_else(|| self.route.map(|r| r.as_str().to_string()));

        CanonEvent {
            v: TRACE_EVENT_V1,
            kind: format!("{}{}", KERNEL_EVENT_PREFIX, self.phase),
            i: self.step_index,
            t: tag,
            mu: Some(Value::Map(mu)),
            meta: None,
        }
    }
}
