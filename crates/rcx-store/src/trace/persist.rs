//! Trace persistence operations.

use crate::cas::FsStore;
use crate::errors::{schema_error, Result};
use rcx_core::canonical::canonical_json_of;
use rcx_core::errors::{ExError, RcxError};
use rcx_core::trace::{canon_events, read_jsonl, to_jsonl, CanonEvent, WorldTrace};

/// Persist a world trace document and return its digest.
pub fn persist_world_trace(store: &FsStore, trace: &WorldTrace) -> Result<String> {
    let json = serde_json::to_value(trace)
        .map_err(|e| ExError::from(RcxError::from(e)).with_op("persist_world_trace"))?;
    let canonical =
        canonical_json_of(&json).map_err(|e| ExError::from(e).with_op("persist_world_trace"))?;
    let digest = store.write(canonical.as_bytes(), "json")?;
    tracing::debug!(digest = %digest, steps = trace.steps, "world trace persisted");
    Ok(digest)
}

/// Load a world trace by digest and validate it.
pub fn load_world_trace(store: &FsStore, digest: &str) -> Result<WorldTrace> {
    let text = store.read_string(digest)?;
    WorldTrace::from_json_str(&text).map_err(|e| schema_error("load_world_trace", e.to_string()))
}

/// Persist canonical events as JSONL and return the digest.
///
/// Equal event streams always produce byte-identical JSONL, so the digest
/// identifies the trace.
pub fn persist_canon_trace(store: &FsStore, events: &[CanonEvent]) -> Result<String> {
    let jsonl = to_jsonl(events).map_err(|e| ExError::from(e).with_op("persist_canon_trace"))?;
    store.write(jsonl.as_bytes(), "jsonl")
}

/// Load a JSONL trace by digest, re-canonicalizing and re-checking
/// contiguity.
pub fn load_canon_trace(store: &FsStore, digest: &str) -> Result<Vec<CanonEvent>> {
    let text = store.read_string(digest)?;
    read_jsonl(&text)
        .and_then(|raw| canon_events(&raw))
        .map_err(|e| schema_error("load_canon_trace", e.to_string()))
}
