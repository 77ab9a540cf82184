//! Stall/fix execution events (trace v2).
//!
//! [`ExecutionEngine`] tracks one value through the stall → fix → fixed
//! cycle. It can record events as a run happens (`stall`, `fix`, `fixed`) or
//! check a recorded stream (`consume_*`), enforcing the same preconditions
//! either way:
//!
//! | event             | requires  | leaves    |
//! |-------------------|-----------|-----------|
//! | `execution.stall` | ACTIVE    | STALLED   |
//! | `execution.fix`   | STALLED, target hash = current | STALLED |
//! | `execution.fixed` | STALLED, before hash = current | ACTIVE  |

use crate::canonical::value_hash;
use crate::errors::{RcxError, Result};
use crate::trace::canon::{CanonEvent, TRACE_EVENT_V2};
use crate::trace::event::{StepPhase, TraceEvent};
use crate::value::Value;
use rcx_core_types::schema::EXEC_SUMMARY_V;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EXECUTION_STALL: &str = "execution.stall";
pub const EXECUTION_FIX: &str = "execution.fix";
pub const EXECUTION_FIXED: &str = "execution.fixed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecStatus {
    Active,
    Stalled,
    Terminal,
}

impl ExecStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecStatus::Active => "ACTIVE",
            ExecStatus::Stalled => "STALLED",
            ExecStatus::Terminal => "TERMINAL",
        }
    }
}

impl std::fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    events: Vec<CanonEvent>,
    next_index: u64,
    status: ExecStatus,
    stall_pattern: Option<String>,
    current_value_hash: Option<String>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Engine whose first event gets index `i`, for streams that interleave
    /// execution events with others.
    pub fn starting_at(i: u64) -> Self {
        Self {
            events: Vec::new(),
            next_index: i,
            status: ExecStatus::Active,
            stall_pattern: None,
            current_value_hash: None,
        }
    }

    pub fn status(&self) -> ExecStatus {
        self.status
    }

    pub fn is_stalled(&self) -> bool {
        self.status == ExecStatus::Stalled
    }

    pub fn current_value_hash(&self) -> Option<&str> {
        self.current_value_hash.as_deref()
    }

    /// Pattern that caused the current stall.
    pub fn stall_pattern(&self) -> Option<&str> {
        self.stall_pattern.as_deref()
    }

    pub fn events(&self) -> &[CanonEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<CanonEvent> {
        self.events
    }

    fn require(&self, expected: ExecStatus, action: &str) -> Result<()> {
        if self.status != expected {
            return Err(RcxError::ExecutionState {
                reason: format!(
                    "cannot {}: status is {}, expected {}",
                    action, self.status, expected
                ),
            });
        }
        Ok(())
    }

    fn emit(&mut self, kind: &str, t: Option<&str>, mu: BTreeMap<String, Value>) {
        self.events.push(CanonEvent {
            v: TRACE_EVENT_V2,
            kind: kind.to_string(),
            i: self.next_index,
            t: t.map(str::to_string),
            mu: Some(Value::Map(mu)),
            meta: None,
        });
        self.next_index += 1;
    }

    /// Record a stall of `value` on `pattern_id`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` unless ACTIVE.
    pub fn stall(&mut self, pattern_id: &str, value: &Value) -> Result<()> {
        self.require(ExecStatus::Active, "stall")?;
        let hash = value_hash(value)?;
        self.enter_stall(pattern_id, &hash);

        let mut mu = BTreeMap::new();
        mu.insert("pattern_id".to_string(), Value::sym(pattern_id));
        mu.insert("value_hash".to_string(), Value::sym(hash));
        self.emit(EXECUTION_STALL, None, mu);
        Ok(())
    }

    /// Record that `rule_id` is about to fix the stalled value.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` unless STALLED on a value with `target_hash`.
    pub fn fix(&mut self, rule_id: &str, target_hash: &str) -> Result<()> {
        self.check_fix(target_hash)?;
        let mut mu = BTreeMap::new();
        mu.insert("target_hash".to_string(), Value::sym(target_hash));
        self.emit(EXECUTION_FIX, Some(rule_id), mu);
        Ok(())
    }

    /// Record the result of a fix and return to ACTIVE.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` unless STALLED.
    pub fn fixed(&mut self, rule_id: &str, before_hash: &str, after: &Value) -> Result<()> {
        self.require(ExecStatus::Stalled, "confirm fix")?;
        let after_hash = value_hash(after)?;

        let mut mu = BTreeMap::new();
        mu.insert("after_hash".to_string(), Value::sym(after_hash.as_str()));
        mu.insert("before_hash".to_string(), Value::sym(before_hash));
        self.emit(EXECUTION_FIXED, Some(rule_id), mu);

        self.leave_stall(after_hash);
        Ok(())
    }

    /// Normal form reached.
    pub fn terminate(&mut self) {
        self.status = ExecStatus::Terminal;
    }

    /// Replay a recorded `execution.stall`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` unless ACTIVE.
    pub fn consume_stall(&mut self, pattern_id: &str, value_hash: &str) -> Result<()> {
        self.require(ExecStatus::Active, "replay stall")?;
        self.enter_stall(pattern_id, value_hash);
        Ok(())
    }

    /// Replay a recorded `execution.fix`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` unless STALLED on a value with `target_hash`.
    pub fn consume_fix(&mut self, _rule_id: &str, target_hash: &str) -> Result<()> {
        self.check_fix(target_hash)
    }

    /// Replay a recorded `execution.fixed`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` unless STALLED on a value with `before_hash`.
    pub fn consume_fixed(&mut self, _rule_id: &str, before_hash: &str, after_hash: &str) -> Result<()> {
        self.require(ExecStatus::Stalled, "replay fixed")?;
        if self.current_value_hash.as_deref() != Some(before_hash) {
            return Err(RcxError::ExecutionState {
                reason: format!(
                    "replay fixed before_hash mismatch: expected {}, got {}",
                    self.current_value_hash.as_deref().unwrap_or("none"),
                    before_hash
                ),
            });
        }
        self.leave_stall(after_hash.to_string());
        Ok(())
    }

    /// Replay one canonical event. Non-execution events are skipped and
    /// return `false`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` for a precondition failure or a missing field.
    pub fn consume(&mut self, event: &CanonEvent) -> Result<bool> {
        let field = |key: &str| {
            event.mu_str(key).ok_or_else(|| RcxError::ExecutionState {
                reason: format!("event {} ({}) needs mu.{}", event.i, event.kind, key),
            })
        };
        let tag = || {
            event.t.as_deref().ok_or_else(|| RcxError::ExecutionState {
                reason: format!("event {} ({}) needs t", event.i, event.kind),
            })
        };

        match event.kind.as_str() {
            EXECUTION_STALL => self.consume_stall(field("pattern_id")?, field("value_hash")?)?,
            EXECUTION_FIX => self.consume_fix(tag()?, field("target_hash")?)?,
            EXECUTION_FIXED => {
                self.consume_fixed(tag()?, field("before_hash")?, field("after_hash")?)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn check_fix(&self, target_hash: &str) -> Result<()> {
        self.require(ExecStatus::Stalled, "fix")?;
        if self.current_value_hash.as_deref() != Some(target_hash) {
            return Err(RcxError::ExecutionState {
                reason: format!(
                    "fix target mismatch: expected {}, got {}",
                    self.current_value_hash.as_deref().unwrap_or("none"),
                    target_hash
                ),
            });
        }
        Ok(())
    }

    fn enter_stall(&mut self, pattern_id: &str, hash: &str) {
        self.current_value_hash = Some(hash.to_string());
        self.stall_pattern = Some(pattern_id.to_string());
        self.status = ExecStatus::Stalled;
    }

    fn leave_stall(&mut self, after_hash: String) {
        self.status = ExecStatus::Active;
        self.stall_pattern = None;
        self.current_value_hash = Some(after_hash);
    }
}

/// Derive execution events from a kernel trace.
///
/// A stall step becomes `execution.stall`; the first fix after it becomes
/// `execution.fix` + `execution.fixed`. A closure terminates the engine.
///
/// # Errors
///
/// Returns `ExecutionState` if the kernel trace violates the cycle, e.g. two
/// stalls with no fix between them.
pub fn execution_events(trace: &[TraceEvent]) -> Result<ExecutionEngine> {
    let mut engine = ExecutionEngine::new();
    let mut stalled_on: Option<&Value> = None;

    for event in trace {
        match event.phase {
            StepPhase::Stall => {
                let pattern = event.projection_id.as_deref().unwrap_or_default();
                engine.stall(pattern, &event.payload)?;
                stalled_on = Some(&event.payload);
            }
            StepPhase::Fix => {
                if let Some(before) = stalled_on.take() {
                    let rule = event.projection_id.as_deref().unwrap_or_default();
                    let before_hash = value_hash(before)?;
                    engine.fix(rule, &before_hash)?;
                    engine.fixed(rule, &before_hash, &event.payload)?;
                }
            }
            StepPhase::Closure => engine.terminate(),
        }
    }

    Ok(engine)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecCounts {
    pub stall: u64,
    pub fix: u64,
    pub fixed: u64,
}

/// `{"v":1,"counts":{"stall","fix","fixed"},"final_status":...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecSummary {
    pub v: u64,
    pub counts: ExecCounts,
    pub final_status: ExecStatus,
}

/// Replay every execution event of a canonical trace and summarize it.
///
/// # Errors
///
/// Returns `ExecutionState` at the first event that breaks the cycle.
pub fn exec_summary(events: &[CanonEvent]) -> Result<ExecSummary> {
    let mut engine = ExecutionEngine::new();
    let mut counts = ExecCounts::default();

    for event in events {
        if !engine.consume(event)? {
            continue;
        }
        match event.kind.as_str() {
            EXECUTION_STALL => counts.stall += 1,
            EXECUTION_FIX => counts.fix += 1,
            _ => counts.fixed += 1,
        }
    }

    Ok(ExecSummary {
        v: EXEC_SUMMARY_V,
        counts,
        final_status: engine.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::canon::{canon_events, to_jsonl};
    use serde_json::json;

    #[test]
    fn test_stall_fix_fixed_cycle() {
        let mut engine = ExecutionEngine::new();
        let before = Value::sym("A");
        let after = Value::sym("B");
        engine.stall("p", &before).unwrap();
        assert!(engine.is_stalled());
        let hash = value_hash(&before).unwrap();
        engine.fix("r", &hash).unwrap();
        engine.fixed("r", &hash, &after).unwrap();
        assert_eq!(engine.status(), ExecStatus::Active);
        assert_eq!(
            engine.current_value_hash(),
            Some(value_hash(&after).unwrap().as_str())
        );

        let kinds: Vec<&str> = engine.events().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec![EXECUTION_STALL, EXECUTION_FIX, EXECUTION_FIXED]);
        let indices: Vec<u64> = engine.events().iter().map(|e| e.i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_preconditions() {
        let mut engine = ExecutionEngine::new();
        assert!(engine.fix("r", "x").is_err());
        assert!(engine.fixed("r", "x", &Value::Null).is_err());
        engine.stall("p", &Value::Null).unwrap();
        assert!(engine.stall("p", &Value::Null).is_err());
        assert!(engine.fix("r", "wrong").is_err());
    }

    #[test]
    fn test_recorded_events_replay_to_same_status() {
        let mut engine = ExecutionEngine::new();
        engine.stall("p", &Value::sym("A")).unwrap();
        let text = to_jsonl(engine.events()).unwrap();
        let raw = crate::trace::canon::read_jsonl(&text).unwrap();
        let summary = exec_summary(&canon_events(&raw).unwrap()).unwrap();
        assert_eq!(summary.final_status, ExecStatus::Stalled);
        assert_eq!(
            summary.counts,
            ExecCounts {
                stall: 1,
                fix: 0,
                fixed: 0
            }
        );
    }

    #[test]
    fn test_summary_shape() {
        let summary = exec_summary(&[]).unwrap();
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({"v": 1, "counts": {"stall": 0, "fix": 0, "fixed": 0}, "final_status": "ACTIVE"})
        );
    }

    #[test]
    fn test_consume_rejects_hash_mismatch() {
        let raw = vec![
            json!({"v": 2, "type": "execution.stall", "i": 0, "mu": {"pattern_id": "p", "value_hash": "aaaa"}}),
            json!({"v": 2, "type": "execution.fixed", "i": 1, "t": "r", "mu": {"before_hash": "bbbb", "after_hash": "cccc"}}),
        ];
        let events = canon_events(&raw).unwrap();
        let err = exec_summary(&events).unwrap_err();
        assert!(matches!(err, RcxError::ExecutionState { .. }));
    }

    #[test]
    fn test_kernel_events_are_ignored_by_summary() {
        let raw = vec![json!({"v": 1, "type": "kernel.fix", "i": 0})];
        let summary = exec_summary(&canon_events(&raw).unwrap()).unwrap();
        assert_eq!(summary.counts, ExecCounts::default());
    }

    #[test]
    fn test_execution_events_from_kernel_trace() {
        let trace = vec![
            TraceEvent::new(0, StepPhase::Stall, None, Some("p".into()), Value::sym("A")).unwrap(),
            TraceEvent::new(1, StepPhase::Fix, None, Some("q".into()), Value::sym("B")).unwrap(),
            TraceEvent::new(2, StepPhase::Closure, None, None, Value::sym("B")).unwrap(),
        ];
        let engine = execution_events(&trace).unwrap();
        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.status(), ExecStatus::Terminal);
        let summary = exec_summary(engine.events()).unwrap();
        assert_eq!(summary.final_status, ExecStatus::Active);
        assert_eq!(summary.counts.fixed, 1);
    }
}
