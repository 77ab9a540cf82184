//! Sharding logic for CAS
//!
//! Blobs live under a subdirectory named after the first 2 hex characters of
//! their digest.

use std::path::{Path, PathBuf};

/// For digest "abc123...", returns "<root>/ab/abc123.<ext>"
pub fn shard_path(root: &Path, digest: &str, extension: &str) -> PathBuf {
    let shard = &digest[..2.min(digest.len())];
    root.join(shard).join(format!("{}.{}", digest, extension))
}

/// A CAS digest is 64 lowercase hex characters.
pub fn is_digest(candidate: &str) -> bool {
    candidate.len() == 64
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
