//! Structural pattern matching over normalized trees.
//!
//! A pattern matches a value of the same shape: equal atoms, pairs with the
//! same arity, and variable sites that bind whatever sits at their position.
//! Matching only looks at the root; rewriting sub-terms is left to repeated
//! dispatch.
//!
//! Rules:
//! * `{"var": "_"}` matches anything and binds nothing.
//! * A name used twice must bind structurally equal subtrees.
//! * An untagged pattern pair matches a value pair with any tag; a tagged one
//!   only matches the same tag.
//! * Failure is [`MatchOutcome::NoMatch`], never an error. Errors are reserved
//!   for budget violations and malformed patterns.

use crate::bindings::Bindings;
use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use crate::normalize::{normalize, subtree_eq, NodeId, NormNode, NormTree};
use crate::traversal::{KernelState, Mode, Phase};
use crate::value::{Value, WILDCARD};

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(Bindings),
    NoMatch,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn into_bindings(self) -> Option<Bindings> {
        match self {
            MatchOutcome::Matched(bindings) => Some(bindings),
            MatchOutcome::NoMatch => None,
        }
    }
}

/// Normalize both sides and match.
///
/// # Errors
///
/// Returns `BudgetExceeded` or `MalformedValue` from normalization or
/// traversal.
pub fn match_value(pattern: &Value, value: &Value, limits: &Limits) -> Result<MatchOutcome> {
    let pattern_tree = normalize(pattern, limits)?;
    let value_tree = normalize(value, limits)?;
    match_normalized(&pattern_tree, &value_tree, limits)
}

/// Match two already-normalized trees and materialize the bindings.
///
/// # Errors
///
/// Returns `BudgetExceeded{Stack}` if the work stack overflows and
/// `MalformedValue` for an empty variable name in the pattern.
pub fn match_normalized(
    pattern: &NormTree,
    value: &NormTree,
    limits: &Limits,
) -> Result<MatchOutcome> {
    match_in_mode(Mode::Match, pattern, value, limits)
}

pub(crate) fn match_in_mode(
    mode: Mode,
    pattern: &NormTree,
    value: &NormTree,
    limits: &Limits,
) -> Result<MatchOutcome> {
    match match_nodes(mode, pattern, value, limits)? {
        Some(bindings) => Ok(MatchOutcome::Matched(
            bindings.map(|id| value.value_at(*id)),
        )),
        None => Ok(MatchOutcome::NoMatch),
    }
}

/// Match and return bindings as node ids into `value`.
///
/// # Errors
///
/// See [`match_normalized`].
pub fn match_nodes(
    mode: Mode,
    pattern: &NormTree,
    value: &NormTree,
    limits: &Limits,
) -> Result<Option<Bindings<NodeId>>> {
    let mut state: KernelState<(NodeId, NodeId), (NodeId, NodeId), Bindings<NodeId>> =
        KernelState::new(mode, (pattern.root(), value.root()), Bindings::new(), limits);

    while let Some((p, v)) = state.next_focus() {
        match pattern.node(p) {
            NormNode::Var(name) if name == WILDCARD => {}
            NormNode::Var(name) if name.is_empty() => {
                return Err(RcxError::malformed("empty variable name in pattern"));
            }
            NormNode::Var(name) => match state.bindings.lookup(name) {
                Some(bound) => {
                    if !subtree_eq(value, *bound, value, v) {
                        return Ok(None);
                    }
                }
                None => state.bindings = state.bindings.bind(name.as_str(), v),
            },
            NormNode::Pair {
                tag: pattern_tag,
                head: pattern_head,
                tail: pattern_tail,
            } => {
                let NormNode::Pair {
                    tag: value_tag,
                    head: value_head,
                    tail: value_tail,
                } = value.node(v)
                else {
                    return Ok(None);
                };
                if pattern_tag.is_some() && pattern_tag != value_tag {
                    return Ok(None);
                }
                state.stack.push((*pattern_tail, *value_tail))?;
                state.focus = Some((*pattern_head, *value_head));
            }
            atom => {
                if atom != value.node(v) {
                    return Ok(None);
                }
            }
        }
    }

    state.phase = Phase::Done;
    Ok(Some(state.bindings))
}
