//! Persisting every artifact of one run together.

use crate::cas::FsStore;
use crate::errors::Result;
use crate::snapshot::persist_snapshot;
use crate::trace::{persist_canon_trace, persist_world_trace};
use rcx_core::snapshot::Snapshot;
use rcx_core::trace::WorldTrace;
use serde::Serialize;

/// Digests of the blobs written for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRun {
    pub world_trace: String,
    pub canon_trace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

/// Store the world trace, its canonical JSONL form and, when given, the
/// snapshot.
pub fn persist_run(
    store: &FsStore,
    trace: &WorldTrace,
    snapshot: Option<&Snapshot>,
) -> Result<StoredRun> {
    let world_trace = persist_world_trace(store, trace)?;
    let canon_trace = persist_canon_trace(store, &trace.canon_events())?;
    let snapshot = snapshot.map(|s| persist_snapshot(store, s)).transpose()?;

    tracing::info!(
        world_trace = %world_trace,
        canon_trace = %canon_trace,
        "run persisted"
    );

    Ok(StoredRun {
        world_trace,
        canon_trace,
        snapshot,
    })
}
