//! Filesystem-based Content-Addressable Storage
//!
//! Provides atomic writes, collision detection, and content-addressed reads

use crate::cas::atomic::atomic_write;
use crate::cas::sharding::{is_digest, shard_path};
use crate::errors::{cas_collision, cas_missing, io_error, Result};
use rcx_core::errors::{ExError, ExErrorKind};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions a blob may be stored under, probed in this order on read.
pub const BLOB_EXTENSIONS: [&str; 3] = ["json", "jsonl", "txt"];

/// Filesystem-based CAS store
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a new CAS store at the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write content to CAS and return the digest
    ///
    /// - Computes SHA256 digest
    /// - Writes atomically using temp→rename
    /// - Idempotent: writing same content twice succeeds
    /// - Detects collisions: different bytes already stored under the digest fail
    pub fn write(&self, content: &[u8], extension: &str) -> Result<String> {
        if !BLOB_EXTENSIONS.contains(&extension) {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("cas_write")
                .with_message(format!("unsupported blob extension '{}'", extension)));
        }

        let digest = compute_digest(content);
        let target_path = shard_path(&self.root, &digest, extension);

        if target_path.exists() {
            let existing = fs::read(&target_path).map_err(|e| io_error("read_cas", e))?;
            if existing == content {
                tracing::debug!(digest = %digest, "cas blob already present");
                return Ok(digest);
            }
            return Err(cas_collision(&digest));
        }

        atomic_write(&target_path, content)?;
        tracing::debug!(digest = %digest, bytes = content.len(), "cas blob written");

        Ok(digest)
    }

    /// Read content from CAS by digest
    ///
    /// The bytes are re-hashed on read; a blob whose content no longer matches
    /// its name is reported as a collision.
    pub fn read(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.locate(digest).ok_or_else(|| cas_missing(digest))?;
        let content = fs::read(&path).map_err(|e| io_error("read_cas", e))?;
        if compute_digest(&content) != digest {
            return Err(cas_collision(digest));
        }
        Ok(content)
    }

    /// Read a blob as UTF-8 text
    pub fn read_string(&self, digest: &str) -> Result<String> {
        let bytes = self.read(digest)?;
        String::from_utf8(bytes).map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("cas_read")
                .with_message(format!("blob {} is not UTF-8: {}", digest, e))
        })
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.locate(digest).is_some()
    }

    fn locate(&self, digest: &str) -> Option<PathBuf> {
        if !is_digest(digest) {
            return None;
        }
        BLOB_EXTENSIONS
            .iter()
            .map(|ext| shard_path(&self.root, digest, ext))
            .find(|path| path.exists())
    }
}

/// Compute SHA256 digest of content
fn compute_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_cas() -> (FsStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cas = FsStore::new(temp_dir.path());
        (cas, temp_dir)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (cas, _dir) = setup_test_cas();

        let content = br#"{"schema":"rcx.snapshot.v1"}"#;
        let digest = cas.write(content, "json").unwrap();

        assert_eq!(cas.read(&digest).unwrap(), content);
        assert!(cas.contains(&digest));
    }

    #[test]
    fn test_idempotent_write() {
        let (cas, _dir) = setup_test_cas();

        let digest1 = cas.write(b"same", "txt").unwrap();
        let digest2 = cas.write(b"same", "txt").unwrap();

        assert_eq!(digest1, digest2);
    }

    #[test]
    fn test_read_missing() {
        let (cas, _dir) = setup_test_cas();

        let err = cas.read(&"0".repeat(64)).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_malformed_digest_is_missing() {
        let (cas, _dir) = setup_test_cas();
        assert!(!cas.contains("../etc/passwd"));
        assert_eq!(cas.read("zz").unwrap_err().kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let (cas, _dir) = setup_test_cas();
        let err = cas.write(b"x", "exe").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_digest_is_sha256() {
        let (cas, _dir) = setup_test_cas();

        let digest = cas.write(b"test", "txt").unwrap();
        assert_eq!(
            digest,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
