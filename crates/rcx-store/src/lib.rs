//! rcx Store - Filesystem persistence for runs
//!
//! Provides:
//! - Content-addressable storage (CAS) with atomic writes and collision checks
//! - Snapshot persistence (canonical JSON, digest equal to the snapshot digest)
//! - World trace and canonical JSONL trace persistence
//!
//! Everything is keyed by SHA-256 of the stored bytes, so storing the same
//! run twice yields the same digests.

pub mod cas;
pub mod errors;
pub mod run;
pub mod snapshot;
pub mod trace;

// Re-export key types
pub use cas::FsStore;
pub use errors::Result;
pub use run::{persist_run, StoredRun};
