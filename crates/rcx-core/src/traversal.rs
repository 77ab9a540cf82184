//! Explicit-stack traversal state shared by matching, substitution and
//! classification.
//!
//! None of the tree walks in this crate recurse on the host stack. Each one
//! keeps its pending work in a [`WorkStack`], whose size is bounded by
//! `Limits::max_stack_depth`, inside a [`KernelState`].

use crate::errors::{RcxError, Result};
use crate::guardrails::{BudgetKind, Limits};

/// What a traversal is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Match,
    Substitute,
    Classify,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Match => "match",
            Mode::Substitute => "substitute",
            Mode::Classify => "classify",
        };
        f.write_str(name)
    }
}

/// Where a traversal is within the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Visiting `focus` for the first time.
    Descend,
    /// Handing a finished child back to the frame on top of the stack.
    Ascend,
    Done,
}

/// Bounded LIFO of pending frames.
#[derive(Debug)]
pub struct WorkStack<F> {
    frames: Vec<F>,
    limit: usize,
    high_water: usize,
}

impl<F> WorkStack<F> {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Vec::new(),
            limit,
            high_water: 0,
        }
    }

    /// # Errors
    ///
    /// Returns `BudgetExceeded{Stack}` if the stack is already at its limit.
    pub fn push(&mut self, frame: F) -> Result<()> {
        if self.frames.len() >= self.limit {
            return Err(RcxError::BudgetExceeded {
                kind: BudgetKind::Stack,
                limit: self.limit,
                observed: self.frames.len() + 1,
            });
        }
        self.frames.push(frame);
        self.high_water = self.high_water.max(self.frames.len());
        Ok(())
    }

    pub fn pop(&mut self) -> Option<F> {
        self.frames.pop()
    }

    pub fn last_mut(&mut self) -> Option<&mut F> {
        self.frames.last_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Largest size the stack reached.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

/// State of one iterative traversal.
///
/// `X` is the focus type, `F` the frame type kept on the stack and `B` the
/// binding environment threaded through the walk.
#[derive(Debug)]
pub struct KernelState<X, F, B> {
    pub mode: Mode,
    pub phase: Phase,
    pub focus: Option<X>,
    pub stack: WorkStack<F>,
    pub bindings: B,
}

impl<X, F, B> KernelState<X, F, B> {
    pub fn new(mode: Mode, focus: X, bindings: B, limits: &Limits) -> Self {
        Self {
            mode,
            phase: Phase::Descend,
            focus: Some(focus),
            stack: WorkStack::new(limits.max_stack_depth),
            bindings,
        }
    }

    /// Take the focus if one is set, otherwise pop the next pending frame.
    pub fn next_focus(&mut self) -> Option<X>
    where
        F: Into<X>,
    {
        match self.focus.take() {
            Some(focus) => Some(focus),
            None => self.stack.pop().map(Into::into),
        }
    }
}
