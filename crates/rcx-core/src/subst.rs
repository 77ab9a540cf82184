//! Template instantiation.
//!
//! Walks a projection body with an explicit stack, copying atoms and
//! containers and replacing every variable site with its binding. An unbound
//! variable stops the walk with [`SubstOutcome::Stall`]; the caller keeps its
//! input unchanged.

use crate::bindings::Bindings;
use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use crate::traversal::{KernelState, Mode, Phase};
use crate::value::{Value, WILDCARD};
use std::collections::{btree_map, BTreeMap};

#[derive(Debug, Clone, PartialEq)]
pub enum SubstOutcome {
    Value(Value),
    /// Name of the first variable with no binding.
    Stall { var: String },
}

enum Frame<'a> {
    Seq {
        rest: std::slice::Iter<'a, Value>,
        out: Vec<Value>,
    },
    Map {
        rest: btree_map::Iter<'a, String, Value>,
        key: Option<String>,
        out: BTreeMap<String, Value>,
    },
}

/// Instantiate `body` under `bindings`.
///
/// The wildcard is never bound, so a wildcard in a body always stalls.
///
/// # Errors
///
/// Returns `BudgetExceeded{Stack}` if the body nests deeper than the work
/// stack allows and `MalformedValue` for an empty variable name.
pub fn substitute(body: &Value, bindings: &Bindings, limits: &Limits) -> Result<SubstOutcome> {
    let mut state: KernelState<&Value, Frame<'_>, &Bindings> =
        KernelState::new(Mode::Substitute, body, bindings, limits);
    let mut carry: Option<Value> = None;

    loop {
        if let Some(node) = state.focus.take() {
            state.phase = Phase::Descend;
            if let Some(name) = node.as_var() {
                if name.is_empty() {
                    return Err(RcxError::malformed("empty variable name in body"));
                }
                let bound = if name == WILDCARD {
                    None
                } else {
                    state.bindings.lookup(name)
                };
                match bound {
                    Some(value) => carry = Some(value.clone()),
                    None => {
                        return Ok(SubstOutcome::Stall {
                            var: name.to_string(),
                        })
                    }
                }
            } else {
                match node {
                    Value::Seq(items) => state.stack.push(Frame::Seq {
                        rest: items.iter(),
                        out: Vec::with_capacity(items.len()),
                    })?,
                    Value::Map(map) => state.stack.push(Frame::Map {
                        rest: map.iter(),
                        key: None,
                        out: BTreeMap::new(),
                    })?,
                    atom => carry = Some(atom.clone()),
                }
            }
        }

        state.phase = Phase::Ascend;
        let Some(frame) = state.stack.last_mut() else {
            state.phase = Phase::Done;
            return Ok(SubstOutcome::Value(carry.unwrap_or(Value::Null)));
        };

        match frame {
            Frame::Seq { rest, out } => {
                if let Some(done) = carry.take() {
                    out.push(done);
                }
                match rest.next() {
                    Some(child) => state.focus = Some(child),
                    None => carry = Some(Value::Seq(std::mem::take(out))),
                }
            }
            Frame::Map { rest, key, out } => {
                if let (Some(done), Some(k)) = (carry.take(), key.take()) {
                    out.insert(k, done);
                }
                match rest.next() {
                    Some((k, child)) => {
                        *key = Some(k.clone());
                        state.focus = Some(child);
                    }
                    None => carry = Some(Value::Map(std::mem::take(out))),
                }
            }
        }

        if state.focus.is_none() && carry.is_some() {
            state.stack.pop();
        }
    }
}
