//! Digest computation for snapshots.
//!
//! ## Determinism Guarantees
//!
//! - Same snapshot → same digest (canonical JSON, keys sorted at every level)
//! - Field construction order never affects the digest
//! - Different rule order → different digest (rule order is semantic)

use crate::canonical::{canonical_json_of, sha256_hex};
use crate::errors::Result;
use crate::snapshot::manifest::Snapshot;

/// Compute the content digest of a snapshot.
///
/// ## Returns
///
/// Hex-encoded SHA256 digest (64 characters) of the canonical JSON form.
///
/// ## Errors
///
/// Returns `RcxError::Serialization` if JSON serialization fails.
pub fn compute_snapshot_digest(snapshot: &Snapshot) -> Result<String> {
    let json = serde_json::to_value(snapshot)?;
    Ok(sha256_hex(canonical_json_of(&json)?.as_bytes()))
}
