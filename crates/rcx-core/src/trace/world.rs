//! World trace v1 document.
//!
//! The frozen keys are `schema, world, seed, max_steps, steps, halt_reason?,
//! error?` followed by the ordered `trace`. Later additions (`status`,
//! `bucket`, `final`) are optional so older readers and writers keep working.

use crate::classify::Bucket;
use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use crate::kernel::{HaltReason, RunState, RunStatus};
use crate::trace::canon::CanonEvent;
use crate::trace::event::TraceEvent;
use crate::value::Value;
use rcx_core_types::schema::WORLD_TRACE_SCHEMA_V1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldTrace {
    pub schema: String,
    pub world: String,
    pub seed: Value,
    pub max_steps: usize,
    pub steps: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<HaltReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub final_value: Option<Value>,
    pub trace: Vec<TraceEvent>,
}

impl WorldTrace {
    pub fn from_run(world: impl Into<String>, seed: Value, limits: &Limits, state: &RunState) -> Self {
        Self {
            schema: WORLD_TRACE_SCHEMA_V1.to_string(),
            world: world.into(),
            seed,
            max_steps: limits.max_steps,
            steps: state.step_counter,
            halt_reason: state.halt_reason,
            error: state.error.clone(),
            status: Some(state.status),
            bucket: state.bucket(),
            final_value: state.final_value().cloned(),
            trace: state.trace.clone(),
        }
    }

    /// Check the document is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `SchemaViolation` for a wrong schema id, a step count that
    /// disagrees with the trace, non-contiguous `step_index`, a stale
    /// `content_hash`, or an `error` halt without a message.
    pub fn validate(&self) -> Result<()> {
        if self.schema != WORLD_TRACE_SCHEMA_V1 {
            return Err(RcxError::schema(format!(
                "schema must be {}, got {}",
                WORLD_TRACE_SCHEMA_V1, self.schema
            )));
        }
        if self.steps != self.trace.len() as u64 {
            return Err(RcxError::schema(format!(
                "steps is {} but trace has {} events",
                self.steps,
                self.trace.len()
            )));
        }
        for (expected, event) in self.trace.iter().enumerate() {
            if event.step_index != expected as u64 {
                return Err(RcxError::schema(format!(
                    "step_index must be contiguous 0..n-1; position {} has {}",
                    expected, event.step_index
                )));
            }
            if !event.hash_matches()? {
                return Err(RcxError::schema(format!(
                    "step {} content_hash does not match payload",
                    expected
                )));
            }
        }
        if self.halt_reason == Some(HaltReason::Error) && self.error.is_none() {
            return Err(RcxError::schema("halt_reason error requires an error message"));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SchemaViolation` if the text is not a valid world trace.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let trace: WorldTrace = crate::canonical::json_from_str(text)
            .map_err(|e| RcxError::schema(format!("world trace: {}", e)))?;
        trace.validate()?;
        Ok(trace)
    }

    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The trace as v1 canonical events.
    pub fn canon_events(&self) -> Vec<CanonEvent> {
        self.trace.iter().map(TraceEvent::to_canon).collect()
    }
}
