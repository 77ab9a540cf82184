//! Snapshot capture and restore.
//!
//! ## Responsibilities
//!
//! - Capture program, guardrails and run state as a v1 document
//! - Validate and restore a document into a runnable program and state
//! - Compute deterministic snapshot digests
//!
//! Restoring a snapshot and resuming must produce the same trace as a run that
//! was never interrupted.
//!
//! ## Non-Responsibilities
//!
//! - Persistence (handled by `rcx-store`)
//! - Orchestration (handled by `rcx-engine`)

pub mod digest;
pub mod manifest;

pub use digest::compute_snapshot_digest;
pub use manifest::{ProgramSection, Restored, Snapshot, StateSection};
