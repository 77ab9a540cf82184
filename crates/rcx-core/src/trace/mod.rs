//! Trace recording, canonicalization and replay.
//!
//! - [`event`]: one kernel step as recorded during a run
//! - [`canon`]: the canonical `{v, type, i, t?, mu?, meta?}` wire form and JSONL
//! - [`execution`]: stall/fix execution events and their summary
//! - [`world`]: the world trace v1 document a run produces

pub mod canon;
pub mod event;
pub mod execution;
pub mod world;

pub use canon::{
    canon_event, canon_events, canon_jsonl, check_contiguous, read_jsonl, to_jsonl, CanonEvent,
    TRACE_EVENT_V1, TRACE_EVENT_V2,
};
pub use event::{StepPhase, TraceEvent, KERNEL_EVENT_PREFIX};
pub use execution::{
    exec_summary, execution_events, ExecCounts, ExecStatus, ExecSummary, ExecutionEngine,
};
pub use world::WorldTrace;
