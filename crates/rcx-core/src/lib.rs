//! rcx Core - Deterministic term-rewriting kernel
//!
//! This crate provides the evaluator and everything needed to record, replay
//! and restore its runs:
//! - Closed JSON-compatible value model with canonical hashing
//! - Normalization of sequences and mappings into tagged head/tail pairs
//! - Iterative pattern matching, substitution and classification
//! - Guardrails (depth, width, steps, work stack, loop detection)
//! - The stall → fix → closure dispatch loop
//! - Trace canonicalization, execution-event replay and world traces
//! - Snapshot v1 capture and restore
//!
//! No traversal in this crate uses host recursion: nested values are walked
//! with explicit work stacks bounded by [`guardrails::Limits`].

pub use rcx_core_types;

pub mod bindings;
pub mod canonical;
pub mod classify;
pub mod errors;
pub mod guardrails;
pub mod kernel;
pub mod logging_facility;
pub mod matcher;
pub mod normalize;
pub mod program;
pub mod snapshot;
pub mod subst;
pub mod trace;
pub mod traversal;
pub mod value;

// Re-export commonly used types
pub use bindings::Bindings;
pub use canonical::{canonical_json, value_hash, ContentHash};
pub use classify::{Bucket, ClassifierRule};
pub use errors::{ExError, ExErrorKind, RcxError, Result};
pub use guardrails::{BudgetKind, CycleHistory, Limits};
pub use kernel::{CancelToken, HaltReason, Kernel, RunState, RunStatus, StepOutcome};
pub use matcher::{match_value, MatchOutcome};
pub use normalize::{denormalize, normalize, NormTree};
pub use program::{Program, Projection, Rule};
pub use snapshot::Snapshot;
pub use subst::{substitute, SubstOutcome};
pub use trace::{CanonEvent, StepPhase, TraceEvent, WorldTrace};
pub use value::Value;
