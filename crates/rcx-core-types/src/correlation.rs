//! Correlation types for run tracking
//!
//! Run identifiers are derived from content, never generated randomly, so two
//! executions of the same world and seed log under the same id.

use serde::{Deserialize, Serialize};

const RUN_ID_PREFIX: &str = "run-";
const RUN_ID_DIGEST_LEN: usize = 16;

/// Identifier for a single evaluator run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Derive a RunId from a hex digest of the run inputs
    ///
    /// Only the first 16 characters of the digest are kept.
    pub fn from_digest(digest: &str) -> Self {
        let short: String = digest.chars().take(RUN_ID_DIGEST_LEN).collect();
        Self(format!("{}{}", RUN_ID_PREFIX, short))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried through a run for log correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: RunId,
    pub world: String,
}

impl RunContext {
    /// Create a context for the given world and input digest
    pub fn new(world: impl Into<String>, digest: &str) -> Self {
        Self {
            run_id: RunId::from_digest(digest),
            world: world.into(),
        }
    }
}
