//! Snapshot persistence layer.
//!
//! ## Responsibilities
//!
//! - Persist snapshots to CAS as canonical JSON
//! - Load and validate snapshots back by digest
//!
//! The CAS digest of a stored snapshot equals
//! [`rcx_core::snapshot::compute_snapshot_digest`] of the same snapshot.
//!
//! ## Non-Responsibilities
//!
//! - Capture and restore (handled by `rcx-core`)
//! - Orchestration (handled by `rcx-engine`)

pub mod persist;

pub use persist::{load_snapshot, persist_snapshot};
