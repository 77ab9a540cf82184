//! The dispatch loop.
//!
//! Each step scans projections in declared order and applies the first whose
//! pattern matches the current value. Exactly one trace event is appended per
//! step:
//!
//! - `fix`: the body instantiated to a new value, which becomes current
//! - `stall`: the body needs a variable the match did not bind; the run
//!   stops `STALLED` with its value unchanged
//! - `closure`: nothing applied (or the rewrite was the identity); the
//!   classifier routes the value to a bucket and the run halts `completed`
//!
//! Budgets and cancellation are checked before a step begins, never in the
//! middle of one. A run that halts on `max_steps`, `loop_detected` or
//! `external_abort` is still classified: the value it stopped on goes to
//! exactly one bucket, without an extra trace event. Only `error` halts and
//! stalled runs leave the buckets alone.

use crate::canonical::value_hash;
use crate::classify::{classify, Bucket};
use crate::errors::{RcxError, Result};
use crate::guardrails::{check_value, CycleHistory, Limits};
use crate::kernel::cancel::CancelToken;
use crate::kernel::state::{HaltReason, RunState, RunStatus};
use crate::matcher::{match_normalized, MatchOutcome};
use crate::normalize::{normalize, NormTree};
use crate::program::Program;
use crate::subst::{substitute, SubstOutcome};
use crate::trace::{StepPhase, TraceEvent};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Fix { projection_id: String },
    Stall { projection_id: String, var: String },
    Closure { bucket: Bucket },
    /// No step was taken, or the step ended the run early.
    Halted(HaltReason),
}

/// What the first applicable projection would do to a value.
enum Selected<'p> {
    Rewrite(&'p str, Value),
    Stall(&'p str, String),
    Nothing,
}

pub struct Kernel<'p> {
    program: &'p Program,
    limits: Limits,
    cancel: Option<CancelToken>,
}

impl<'p> Kernel<'p> {
    pub fn new(program: &'p Program, limits: Limits) -> Self {
        Self {
            program,
            limits,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Validate a seed and build the initial state. The seed's hash opens the
    /// loop-detection history.
    ///
    /// # Errors
    ///
    /// Returns `MalformedValue` or `BudgetExceeded` if the seed is rejected.
    pub fn start(&self, seed: Value) -> Result<RunState> {
        normalize(&seed, &self.limits)?;
        let mut history = CycleHistory::new(self.limits.cycle_window);
        history.record(value_hash(&seed)?);
        Ok(RunState::new(seed, history))
    }

    /// Start from `seed` and step until the run leaves `ACTIVE`.
    ///
    /// Errors raised during a step end the run with `HaltReason::Error`
    /// instead of being returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the seed is rejected.
    pub fn run(&self, seed: Value) -> Result<RunState> {
        let mut state = self.start(seed)?;
        self.drive(&mut state);
        Ok(state)
    }

    /// Continue a run. A stalled run is reactivated first, so a run stalled
    /// under one program can continue under another. Halted runs are left
    /// untouched.
    pub fn resume(&self, state: &mut RunState) {
        if state.status == RunStatus::Stalled {
            state.status = RunStatus::Active;
        }
        self.drive(state);
    }

    fn drive(&self, state: &mut RunState) {
        while state.is_active() {
            if let Err(err) = self.step(state) {
                tracing::debug!(error = %err, "kernel step failed");
            }
        }
    }

    /// Take one step.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionState` if the run is stalled. Any other error also
    /// halts the run with `HaltReason::Error`.
    pub fn step(&self, state: &mut RunState) -> Result<StepOutcome> {
        match state.status {
            RunStatus::Active => {}
            RunStatus::Stalled => {
                return Err(RcxError::ExecutionState {
                    reason: "run is stalled; resume it to continue".to_string(),
                })
            }
            RunStatus::Halted => {
                return Ok(StepOutcome::Halted(
                    state.halt_reason.unwrap_or(HaltReason::Completed),
                ))
            }
        }

        if let Some(Err(abort)) = self.cancel.as_ref().map(CancelToken::check) {
            tracing::debug!(step_index = state.step_counter, reason = %abort, "cancelled");
            return self.halt_routed(state, HaltReason::ExternalAbort);
        }

        if self.limits.check_steps(state.step_counter as usize).is_err() {
            return self.halt_routed(state, HaltReason::MaxSteps);
        }

        match self.apply(state) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                state.halt(HaltReason::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    fn apply(&self, state: &mut RunState) -> Result<StepOutcome> {
        let current = state
            .current
            .clone()
            .ok_or_else(|| RcxError::ExecutionState {
                reason: "active run has no current value".to_string(),
            })?;
        let tree = normalize(&current, &self.limits)?;
        let step_index = state.step_counter;

        let selected = match self.select(&tree)? {
            Selected::Rewrite(_, next) if next == current => Selected::Nothing,
            other => other,
        };

        match selected {
            Selected::Rewrite(projection_id, next) => {
                check_value(&next, &self.limits)?;
                tracing::debug!(
                    step_index = step_index,
                    projection_id = projection_id,
                    "fix"
                );
                self.record(
                    state,
                    TraceEvent::new(
                        step_index,
                        StepPhase::Fix,
                        None,
                        Some(projection_id.to_string()),
                        next.clone(),
                    )?,
                );
                let seen = state.history.observe(&next);
                state.current = Some(next);
                match seen {
                    Err(RcxError::LoopDetected { hash, .. }) => {
                        tracing::debug!(step_index = step_index, hash = %hash, "loop detected");
                        return self.halt_routed(state, HaltReason::LoopDetected);
                    }
                    other => other?,
                }
                Ok(StepOutcome::Fix {
                    projection_id: projection_id.to_string(),
                })
            }
            Selected::Stall(projection_id, var) => {
                tracing::debug!(
                    step_index = step_index,
                    projection_id = projection_id,
                    var = %var,
                    "stall"
                );
                self.record(
                    state,
                    TraceEvent::new(
                        step_index,
                        StepPhase::Stall,
                        None,
                        Some(projection_id.to_string()),
                        current.clone(),
                    )?,
                );
                state.status = RunStatus::Stalled;
                Ok(StepOutcome::Stall {
                    projection_id: projection_id.to_string(),
                    var,
                })
            }
            Selected::Nothing => {
                let bucket = self.route(&current, &tree)?;
                tracing::debug!(step_index = step_index, bucket = %bucket, "closure");
                self.record(
                    state,
                    TraceEvent::new(step_index, StepPhase::Closure, Some(bucket), None, current.clone())?,
                );
                state.current = None;
                state.route_to(bucket, current);
                state.halt(HaltReason::Completed, None);
                Ok(StepOutcome::Closure { bucket })
            }
        }
    }

    /// Halt for `reason`, routing the value the run stopped on. A value the
    /// classifier rejects turns the halt into an `error` halt.
    fn halt_routed(&self, state: &mut RunState, reason: HaltReason) -> Result<StepOutcome> {
        let Some(current) = state.current.clone() else {
            state.halt(reason, None);
            return Ok(StepOutcome::Halted(reason));
        };
        let routed = normalize(&current, &self.limits).and_then(|tree| self.route(&current, &tree));
        match routed {
            Ok(bucket) => {
                tracing::debug!(reason = %reason, bucket = %bucket, "halted");
                state.route_to(bucket, current);
                state.halt(reason, None);
                Ok(StepOutcome::Halted(reason))
            }
            Err(err) => {
                state.halt(HaltReason::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    fn route(&self, value: &Value, tree: &NormTree) -> Result<Bucket> {
        let classification = classify(self.program.classifiers(), value, tree, &self.limits)?;
        tracing::debug!(
            bucket = %classification.bucket,
            rule = classification.rule_id.as_deref().unwrap_or("structural"),
            "classified"
        );
        Ok(classification.bucket)
    }

    fn select(&self, tree: &NormTree) -> Result<Selected<'p>> {
        for projection in self.program.projections() {
            let MatchOutcome::Matched(bindings) =
                match_normalized(projection.pattern_tree(), tree, &self.limits)?
            else {
                continue;
            };
            return Ok(match substitute(&projection.body, &bindings, &self.limits)? {
                SubstOutcome::Value(next) => Selected::Rewrite(&projection.id, next),
                SubstOutcome::Stall { var } => Selected::Stall(&projection.id, var),
            });
        }
        Ok(Selected::Nothing)
    }

    fn record(&self, state: &mut RunState, event: TraceEvent) {
        state.trace.push(event);
        state.step_counter += 1;
    }
}
