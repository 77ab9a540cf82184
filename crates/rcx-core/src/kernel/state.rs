//! Run-scoped kernel state.
//!
//! Everything a run mutates lives in [`RunState`]: the current value, the
//! bucket contents, the step counter, the trace and the loop-detection
//! history. Nothing is process-global, so independent runs never share
//! counters.

use crate::classify::Bucket;
use crate::guardrails::CycleHistory;
use crate::trace::TraceEvent;
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    Completed,
    MaxSteps,
    LoopDetected,
    Error,
    ExternalAbort,
}

impl HaltReason {
    pub const ALL: [HaltReason; 5] = [
        HaltReason::Completed,
        HaltReason::MaxSteps,
        HaltReason::LoopDetected,
        HaltReason::Error,
        HaltReason::ExternalAbort,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HaltReason::Completed => "completed",
            HaltReason::MaxSteps => "max_steps",
            HaltReason::LoopDetected => "loop_detected",
            HaltReason::Error => "error",
            HaltReason::ExternalAbort => "external_abort",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Has a current value and may take another step.
    Active,
    /// A projection needs a binding the program cannot supply.
    Stalled,
    /// Stopped for good; see the halt reason.
    Halted,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Active => "ACTIVE",
            RunStatus::Stalled => "STALLED",
            RunStatus::Halted => "HALTED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of every bucket, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Buckets {
    pub ra: Vec<Value>,
    pub lobes: Vec<Value>,
    pub sink: Vec<Value>,
    pub null_reg: Vec<Value>,
    pub inf_reg: Vec<Value>,
}

impl Buckets {
    pub fn get(&self, bucket: Bucket) -> &[Value] {
        match bucket {
            Bucket::Ra => &self.ra,
            Bucket::Lobe => &self.lobes,
            Bucket::Sink => &self.sink,
            Bucket::NullReg => &self.null_reg,
            Bucket::InfReg => &self.inf_reg,
        }
    }

    pub fn push(&mut self, bucket: Bucket, value: Value) {
        match bucket {
            Bucket::Ra => self.ra.push(value),
            Bucket::Lobe => self.lobes.push(value),
            Bucket::Sink => self.sink.push(value),
            Bucket::NullReg => self.null_reg.push(value),
            Bucket::InfReg => self.inf_reg.push(value),
        }
    }

    pub fn total(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.get(*b).len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    /// `None` once a closure step has routed the value to a bucket. Runs that
    /// halt any other way keep the value they stopped on.
    pub current: Option<Value>,
    pub buckets: Buckets,
    /// Bucket the final value was routed to. Set on every halt except `error`.
    pub route: Option<Bucket>,
    pub step_counter: u64,
    pub trace: Vec<TraceEvent>,
    pub status: RunStatus,
    pub halt_reason: Option<HaltReason>,
    /// Message for `HaltReason::Error`.
    pub error: Option<String>,
    pub history: CycleHistory,
}

impl RunState {
    pub fn new(seed: Value, history: CycleHistory) -> Self {
        Self {
            current: Some(seed),
            buckets: Buckets::default(),
            route: None,
            step_counter: 0,
            trace: Vec::new(),
            status: RunStatus::Active,
            halt_reason: None,
            error: None,
            history,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Active
    }

    pub fn is_halted(&self) -> bool {
        self.status == RunStatus::Halted
    }

    pub fn bucket(&self) -> Option<Bucket> {
        self.route
    }

    /// Value the run ended on: the current value, or the payload of the
    /// closure step once routed.
    pub fn final_value(&self) -> Option<&Value> {
        self.current
            .as_ref()
            .or_else(|| self.trace.last().map(|event| &event.payload))
    }

    pub(crate) fn route_to(&mut self, bucket: Bucket, value: Value) {
        self.buckets.push(bucket, value);
        self.route = Some(bucket);
    }

    pub(crate) fn halt(&mut self, reason: HaltReason, error: Option<String>) {
        self.status = RunStatus::Halted;
        self.halt_reason = Some(reason);
        self.error = error;
    }
}
