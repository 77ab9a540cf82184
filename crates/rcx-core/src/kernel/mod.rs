//! Kernel dispatch loop and run state.

pub mod cancel;
pub mod dispatch;
pub mod replay;
pub mod state;

pub use cancel::CancelToken;
pub use dispatch::{Kernel, StepOutcome};
pub use replay::{compare_traces, verify_run};
pub use state::{Buckets, HaltReason, RunState, RunStatus};
