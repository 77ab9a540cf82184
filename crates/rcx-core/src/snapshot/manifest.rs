//! Snapshot document and schema.
//!
//! A snapshot is the full state of a run plus the program that produced it,
//! so a run can be stopped, stored and continued elsewhere.
//!
//! ## Schema Version
//!
//! Current snapshot schema: **rcx.snapshot.v1**
//!
//! ## Fields
//!
//! - `schema`: schema id
//! - `world`: world name
//! - `program.rules`: every rule as a labelled rule line, in declared order
//! - `program.digest`: SHA-256 of the rule lines joined by newlines
//! - `limits`: guardrails the run was started with (optional)
//! - `state.current`: current value, `null` once routed to a bucket
//! - `state.ra` / `lobes` / `sink` / `null_reg` / `inf_reg`: bucket contents
//! - `state.step_counter`: steps taken so far
//! - `state.trace`: recorded trace events
//! - `state.status`, `state.halt_reason`, `state.error`: run status
//! - `state.route`: bucket the final value was routed to (optional)
//! - `state.history`: loop-detection hashes, oldest first
//!
//! `null` in `state.current` is ambiguous between "routed" and "the value is
//! null"; the halt reason decides. Only a `completed` run has been routed.

use crate::canonical::json_from_str;
use crate::classify::Bucket;
use crate::errors::{RcxError, Result};
use crate::guardrails::{check_value, CycleHistory, Limits};
use crate::kernel::{Buckets, HaltReason, RunState, RunStatus};
use crate::program::Program;
use crate::trace::TraceEvent;
use crate::value::Value;
use rcx_core_types::schema::SNAPSHOT_SCHEMA_V1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema: String,
    pub world: String,
    pub program: ProgramSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
    pub state: StateSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSection {
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSection {
    pub current: Value,
    #[serde(default)]
    pub ra: Vec<Value>,
    #[serde(default)]
    pub lobes: Vec<Value>,
    #[serde(default)]
    pub sink: Vec<Value>,
    pub step_counter: u64,
    #[serde(default)]
    pub null_reg: Vec<Value>,
    #[serde(default)]
    pub inf_reg: Vec<Value>,
    #[serde(default)]
    pub trace: Vec<TraceEvent>,
    #[serde(default = "default_status")]
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<HaltReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Bucket>,
}

fn default_status() -> RunStatus {
    RunStatus::Active
}

/// A snapshot turned back into something the kernel can run.
#[derive(Debug, Clone)]
pub struct Restored {
    pub program: Program,
    pub limits: Limits,
    pub state: RunState,
}

impl Snapshot {
    /// Capture a run.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if a rule cannot be rendered.
    pub fn capture(
        world: impl Into<String>,
        program: &Program,
        limits: &Limits,
        state: &RunState,
    ) -> Result<Self> {
        let rules = program.rule_lines()?;
        let digest = program.digest()?;
        let buckets = state.buckets.clone();

        Ok(Self {
            schema: SNAPSHOT_SCHEMA_V1.to_string(),
            world: world.into(),
            program: ProgramSection {
                rules,
                digest: Some(digest),
            },
            limits: Some(limits.clone()),
            state: StateSection {
                current: state.current.clone().unwrap_or(Value::Null),
                ra: buckets.ra,
                lobes: buckets.lobes,
                sink: buckets.sink,
                step_counter: state.step_counter,
                null_reg: buckets.null_reg,
                inf_reg: buckets.inf_reg,
                trace: state.trace.clone(),
                status: state.status,
                halt_reason: state.halt_reason,
                error: state.error.clone(),
                history: state.history.hashes(),
                route: state.route,
            },
        })
    }

    /// Check the document before trusting it.
    ///
    /// # Errors
    ///
    /// Returns `SchemaViolation` for a wrong schema id, a step counter that
    /// disagrees with the trace, non-contiguous `step_index`, or a status
    /// inconsistent with the halt reason.
    pub fn validate(&self) -> Result<()> {
        if self.schema != SNAPSHOT_SCHEMA_V1 {
            return Err(RcxError::schema(format!(
                "schema must be {}, got {}",
                SNAPSHOT_SCHEMA_V1, self.schema
            )));
        }

        let state = &self.state;
        if state.step_counter != state.trace.len() as u64 {
            return Err(RcxError::schema(format!(
                "step_counter is {} but trace has {} events",
                state.step_counter,
                state.trace.len()
            )));
        }
        for (expected, event) in state.trace.iter().enumerate() {
            if event.step_index != expected as u64 {
                return Err(RcxError::schema(format!(
                    "trace step_index must be contiguous; position {} has {}",
                    expected, event.step_index
                )));
            }
        }

        match (state.status, state.halt_reason) {
            (RunStatus::Halted, Some(_)) | (RunStatus::Active | RunStatus::Stalled, None) => {}
            (status, reason) => {
                return Err(RcxError::schema(format!(
                    "status {} is inconsistent with halt_reason {}",
                    status,
                    reason.map_or("none", HaltReason::as_str)
                )))
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SchemaViolation` if the text is not a valid snapshot.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let snapshot: Snapshot = json_from_str(text)
            .map_err(|e| RcxError::schema(format!("snapshot: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild the program and run state.
    ///
    /// `limits` overrides the stored guardrails; when both are absent the
    /// defaults apply. The loop-detection history is trimmed to the window in
    /// effect.
    ///
    /// # Errors
    ///
    /// * `SchemaViolation` - the document is inconsistent or its program
    ///   digest does not match its rules
    /// * `BudgetExceeded` - the current value is deeper or wider than the
    ///   limits in effect
    /// * `RuleSyntax` and other program errors from re-parsing the rules
    pub fn restore(&self, limits: Option<Limits>) -> Result<Restored> {
        self.validate()?;
        let limits = limits
            .or_else(|| self.limits.clone())
            .unwrap_or_default();

        let program = Program::from_rule_lines(&self.program.rules, &limits)?;
        if let Some(expected) = &self.program.digest {
            let actual = program.digest()?;
            if &actual != expected {
                return Err(RcxError::schema(format!(
                    "program digest mismatch: snapshot has {}, rules hash to {}",
                    expected, actual
                )));
            }
        }

        let s = &self.state;
        let current = match s.halt_reason {
            Some(HaltReason::Completed) => None,
            _ => {
                check_value(&s.current, &limits)?;
                Some(s.current.clone())
            }
        };
        // Documents written before `route` existed only record it on the
        // closure event.
        let route = s.route.or_else(|| match s.halt_reason {
            Some(HaltReason::Completed) => s.trace.last().and_then(|event| event.route),
            _ => None,
        });
        let state = RunState {
            current,
            buckets: Buckets {
                ra: s.ra.clone(),
                lobes: s.lobes.clone(),
                sink: s.sink.clone(),
                null_reg: s.null_reg.clone(),
                inf_reg: s.inf_reg.clone(),
            },
            route,
            step_counter: s.step_counter,
            trace: s.trace.clone(),
            status: s.status,
            halt_reason: s.halt_reason,
            error: s.error.clone(),
            history: CycleHistory::from_hashes(limits.cycle_window, s.history.iter().cloned()),
        };

        Ok(Restored {
            program,
            limits,
            state,
        })
    }
}
