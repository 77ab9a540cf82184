//! Snapshot persistence operations.

use crate::cas::FsStore;
use crate::errors::{schema_error, Result};
use rcx_core::canonical::canonical_json_of;
use rcx_core::errors::ExError;
use rcx_core::snapshot::Snapshot;

/// Persist a snapshot to content-addressable storage.
///
/// Writes the canonical JSON form and returns its digest. Idempotent: the
/// same snapshot always lands on the same digest.
///
/// ## Errors
///
/// - `ExErrorKind::Serialization`: JSON serialization failed
/// - `ExErrorKind::Io` / `ExErrorKind::Collision`: CAS write failed
pub fn persist_snapshot(store: &FsStore, snapshot: &Snapshot) -> Result<String> {
    let json = serde_json::to_value(snapshot)
        .map_err(|e| ExError::from(rcx_core::RcxError::from(e)).with_op("persist_snapshot"))?;
    let canonical =
        canonical_json_of(&json).map_err(|e| ExError::from(e).with_op("persist_snapshot"))?;
    let digest = store.write(canonical.as_bytes(), "json")?;
    tracing::debug!(digest = %digest, world = %snapshot.world, "snapshot persisted");
    Ok(digest)
}

/// Load a snapshot by digest and validate it.
///
/// ## Errors
///
/// - `ExErrorKind::NotFound`: no blob under the digest
/// - `ExErrorKind::SchemaViolation`: the blob is not a valid v1 snapshot
pub fn load_snapshot(store: &FsStore, digest: &str) -> Result<Snapshot> {
    let text = store.read_string(digest)?;
    Snapshot::from_json_str(&text).map_err(|e| schema_error("load_snapshot", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcx_core::snapshot::compute_snapshot_digest;
    use rcx_core::{Kernel, Limits, Program, Value};
    use tempfile::TempDir;

    fn snapshot() -> Snapshot {
        let limits = Limits::default();
        let program = Program::parse("PING -> rewrite(PONG)\nPONG -> ra\n", &limits).unwrap();
        let state = Kernel::new(&program, limits.clone())
            .run(Value::sym("PING"))
            .unwrap();
        Snapshot::capture("pingpong", &program, &limits, &state).unwrap()
    }

    #[test]
    fn test_persist_matches_snapshot_digest() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let snapshot = snapshot();

        let digest = persist_snapshot(&store, &snapshot).unwrap();
        assert_eq!(digest, compute_snapshot_digest(&snapshot).unwrap());
        assert_eq!(load_snapshot(&store, &digest).unwrap(), snapshot);
    }

    #[test]
    fn test_load_rejects_non_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let digest = store.write(br#"{"schema":"other"}"#, "json").unwrap();

        let err = load_snapshot(&store, &digest).unwrap_err();
        assert_eq!(err.code(), "ERR_SCHEMA_VIOLATION");
    }
}
