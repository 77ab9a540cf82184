//! Run budgets and cycle history.
//!
//! Every limit is inclusive: a value exactly at the limit is accepted, one
//! beyond it fails with [`RcxError::BudgetExceeded`]. All state here is owned
//! by a single run.

use crate::canonical::value_hash;
use crate::errors::{RcxError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_MAX_DEPTH: usize = 4096;
pub const DEFAULT_MAX_WIDTH: usize = 1_000_000;
pub const DEFAULT_MAX_STEPS: usize = 1000;
pub const DEFAULT_MAX_STACK_DEPTH: usize = 65_536;
pub const DEFAULT_CYCLE_WINDOW: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    Depth,
    Width,
    Steps,
    Stack,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BudgetKind::Depth => "depth",
            BudgetKind::Width => "width",
            BudgetKind::Steps => "steps",
            BudgetKind::Stack => "stack",
        };
        f.write_str(name)
    }
}

/// Guardrail configuration for one run.
///
/// Missing fields in a JSON limits file fall back to the defaults; unknown
/// fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub max_depth: usize,
    pub max_width: usize,
    pub max_steps: usize,
    pub max_stack_depth: usize,
    /// Number of recent state hashes kept for loop detection. Zero disables it.
    pub cycle_window: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_width: DEFAULT_MAX_WIDTH,
            max_steps: DEFAULT_MAX_STEPS,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            cycle_window: DEFAULT_CYCLE_WINDOW,
        }
    }
}

impl Limits {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_width(mut self, max_width: usize) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn with_max_stack_depth(mut self, max_stack_depth: usize) -> Self {
        self.max_stack_depth = max_stack_depth;
        self
    }

    pub fn with_cycle_window(mut self, cycle_window: usize) -> Self {
        self.cycle_window = cycle_window;
        self
    }

    /// Parse a limits document.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for invalid JSON or unknown fields.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    ///
    /// Returns `BudgetExceeded{Depth}` when `observed` is above the limit.
    pub fn check_depth(&self, observed: usize) -> Result<()> {
        exceeds(BudgetKind::Depth, self.max_depth, observed)
    }

    /// # Errors
    ///
    /// Returns `BudgetExceeded{Width}` when `observed` is above the limit.
    pub fn check_width(&self, observed: usize) -> Result<()> {
        exceeds(BudgetKind::Width, self.max_width, observed)
    }

    /// Steps are counted before they run: `taken` is the number already done.
    ///
    /// # Errors
    ///
    /// Returns `BudgetExceeded{Steps}` when one more step would pass the limit.
    pub fn check_steps(&self, taken: usize) -> Result<()> {
        exceeds(BudgetKind::Steps, self.max_steps, taken + 1)
    }
}

fn exceeds(kind: BudgetKind, limit: usize, observed: usize) -> Result<()> {
    if observed > limit {
        return Err(RcxError::BudgetExceeded {
            kind,
            limit,
            observed,
        });
    }
    Ok(())
}

/// Measure depth and width of a value without recursion.
///
/// # Errors
///
/// Returns `BudgetExceeded` for the first limit crossed, checking each node as
/// it is reached.
pub fn check_value(value: &Value, limits: &Limits) -> Result<()> {
    let mut stack = vec![(value, 0usize)];
    while let Some((node, level)) = stack.pop() {
        match node {
            Value::Seq(items) => {
                limits.check_depth(level + 1)?;
                limits.check_width(items.len())?;
                stack.extend(items.iter().map(|child| (child, level + 1)));
            }
            Value::Map(map) => {
                limits.check_depth(level + 1)?;
                limits.check_width(map.len())?;
                stack.extend(map.values().map(|child| (child, level + 1)));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Rolling window of recent state hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleHistory {
    window: usize,
    recent: VecDeque<String>,
}

impl CycleHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    /// Rebuild a history from stored hashes, oldest first. Only the newest
    /// `window` entries are kept.
    pub fn from_hashes(window: usize, hashes: impl IntoIterator<Item = String>) -> Self {
        let mut history = Self::new(window);
        for hash in hashes {
            history.record(hash);
        }
        history
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.recent.iter().any(|h| h == hash)
    }

    pub fn record(&mut self, hash: String) {
        if self.window == 0 {
            return;
        }
        while self.recent.len() >= self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(hash);
    }

    /// Check a produced value against the window, then record it.
    ///
    /// # Errors
    ///
    /// Returns `LoopDetected` when the value's hash is already in the window.
    pub fn observe(&mut self, value: &Value) -> Result<()> {
        let hash = value_hash(value)?;
        if self.contains(&hash) {
            return Err(RcxError::LoopDetected {
                hash,
                history: self.hashes(),
            });
        }
        self.record(hash);
        Ok(())
    }

    /// Stored hashes, oldest first.
    pub fn hashes(&self) -> Vec<String> {
        self.recent.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}
