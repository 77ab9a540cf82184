//! Normalization into fixed-arity linked pairs.
//!
//! Variable-length sequences and mappings are re-expressed as chains of
//! head/tail pairs so a fixed-arity pattern can match "any length":
//!
//! * `[a, b]` becomes `list(a, (b, null))`, with only the first pair tagged.
//! * `{"k": v, ...}` becomes a `dict`-tagged chain whose heads are
//!   `(key, (value, null))` pairs, in sorted key order.
//! * Empty sequences and mappings become `null`.
//! * Mappings shaped `{head, tail}` or `{_type, head, tail}` already are pairs.
//!
//! The tag is what tells a sequence of two-element pairs apart from a mapping
//! once both are flattened into the same shape.
//!
//! Normalized trees live in an arena ([`NormTree`]). Children are always
//! allocated before their parents, so every edge points to a smaller index
//! and a tree can never contain a cycle.

use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use crate::traversal::WorkStack;
use crate::value::{Value, VAR_KEY};
use serde_json::Number;
use std::collections::{btree_map, BTreeMap};

pub const TYPE_KEY: &str = "_type";
pub const HEAD_KEY: &str = "head";
pub const TAIL_KEY: &str = "tail";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    List,
    Dict,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::List => "list",
            TypeTag::Dict => "dict",
        }
    }

    /// # Errors
    ///
    /// Returns `MalformedValue` for anything outside the tag whitelist.
    pub fn parse(raw: &Value) -> Result<Self> {
        match raw.as_str() {
            Some("list") => Ok(TypeTag::List),
            Some("dict") => Ok(TypeTag::Dict),
            _ => Err(RcxError::malformed(format!(
                "type tag {:?} is not one of list, dict",
                raw
            ))),
        }
    }
}

/// Index of a node inside one [`NormTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormNode {
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    Var(String),
    Pair {
        tag: Option<TypeTag>,
        head: NodeId,
        tail: NodeId,
    },
}

const NULL_NODE: NormNode = NormNode::Null;

#[derive(Debug, Clone)]
pub struct NormTree {
    nodes: Vec<NormNode>,
    root: NodeId,
}

impl NormTree {
    /// Every tree shares one null node at index 0.
    pub const NULL: NodeId = NodeId(0);

    fn new() -> Self {
        Self {
            nodes: vec![NormNode::Null],
            root: Self::NULL,
        }
    }

    fn alloc(&mut self, node: NormNode) -> NodeId {
        if node == NormNode::Null {
            return Self::NULL;
        }
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &NormNode {
        self.nodes.get(id.0).unwrap_or(&NULL_NODE)
    }

    /// Number of allocated nodes, including the shared null.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root == Self::NULL
    }

    /// Heads of a well-formed chain starting at `id`: every tail after the
    /// first pair is an untagged pair and the chain ends in null.
    pub fn chain(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let mut heads = Vec::new();
        let mut cursor = id;
        loop {
            match self.node(cursor) {
                NormNode::Null => return Some(heads),
                NormNode::Pair { tag, head, tail } => {
                    if cursor != id && tag.is_some() {
                        return None;
                    }
                    heads.push(*head);
                    cursor = *tail;
                }
                _ => return None,
            }
        }
    }

    /// Entries of a well-formed dict chain, in key order.
    fn dict_entries(&self, id: NodeId) -> Option<Vec<(String, NodeId)>> {
        let mut entries: Vec<(String, NodeId)> = Vec::new();
        for kv in self.chain(id)? {
            let NormNode::Pair {
                tag: None,
                head: key_id,
                tail: rest,
            } = self.node(kv)
            else {
                return None;
            };
            let NormNode::Str(key) = self.node(*key_id) else {
                return None;
            };
            let NormNode::Pair {
                tag: None,
                head: value_id,
                tail: end,
            } = self.node(*rest)
            else {
                return None;
            };
            if *end != Self::NULL {
                return None;
            }
            if entries.last().is_some_and(|(prev, _)| prev >= key) {
                return None;
            }
            entries.push((key.clone(), *value_id));
        }
        Some(entries)
    }

    /// Rebuild the value rooted at `id`.
    pub fn value_at(&self, id: NodeId) -> Value {
        denormalize(self, id)
    }

    pub fn to_value(&self) -> Value {
        denormalize(self, self.root)
    }
}

/// Normalize a value into a fresh arena.
///
/// Depth and width are checked as each container is reached. A tail edge of a
/// linked pair does not add depth.
///
/// # Errors
///
/// * `BudgetExceeded{Depth|Width|Stack}` when a limit is crossed
/// * `MalformedValue` for an empty variable name or an unknown type tag
pub fn normalize(value: &Value, limits: &Limits) -> Result<NormTree> {
    enum Frame<'a> {
        Seq {
            rest: std::slice::Iter<'a, Value>,
            done: Vec<NodeId>,
            level: usize,
        },
        Map {
            rest: btree_map::Iter<'a, String, Value>,
            keys: Vec<&'a str>,
            done: Vec<NodeId>,
            level: usize,
        },
        Pair {
            tag: Option<TypeTag>,
            tail: Option<&'a Value>,
            head: Option<NodeId>,
            level: usize,
        },
    }

    let mut tree = NormTree::new();
    let mut stack: WorkStack<Frame<'_>> = WorkStack::new(limits.max_stack_depth);
    let mut pending: Option<(&Value, usize)> = Some((value, 0));
    let mut carry: Option<NodeId> = None;

    loop {
        if let Some((node, level)) = pending.take() {
            match node {
                Value::Null => carry = Some(NormTree::NULL),
                Value::Bool(b) => carry = Some(tree.alloc(NormNode::Bool(*b))),
                Value::Number(n) => carry = Some(tree.alloc(NormNode::Number(n.clone()))),
                Value::Str(s) => carry = Some(tree.alloc(NormNode::Str(s.clone()))),
                Value::Seq(items) if items.is_empty() => carry = Some(NormTree::NULL),
                Value::Seq(items) => {
                    limits.check_depth(level + 1)?;
                    limits.check_width(items.len())?;
                    stack.push(Frame::Seq {
                        rest: items.iter(),
                        done: Vec::with_capacity(items.len()),
                        level: level + 1,
                    })?;
                }
                Value::Map(map) if map.is_empty() => carry = Some(NormTree::NULL),
                Value::Map(map) => {
                    if let Some(name) = node.as_var() {
                        if name.is_empty() {
                            return Err(RcxError::malformed("empty variable name"));
                        }
                        carry = Some(tree.alloc(NormNode::Var(name.to_string())));
                    } else if let Some((tag, head, tail)) = linked_shape(map)? {
                        limits.check_depth(level + 1)?;
                        stack.push(Frame::Pair {
                            tag,
                            tail: Some(tail),
                            head: None,
                            level,
                        })?;
                        pending = Some((head, level + 1));
                        continue;
                    } else {
                        if map.contains_key(VAR_KEY) && map.len() == 1 {
                            return Err(RcxError::malformed("variable name must be a string"));
                        }
                        limits.check_depth(level + 1)?;
                        limits.check_width(map.len())?;
                        stack.push(Frame::Map {
                            rest: map.iter(),
                            keys: Vec::with_capacity(map.len()),
                            done: Vec::with_capacity(map.len()),
                            level: level + 1,
                        })?;
                    }
                }
            }
        }

        let Some(frame) = stack.last_mut() else {
            let root = carry.unwrap_or(NormTree::NULL);
            tree.root = root;
            return Ok(tree);
        };

        let finished = match frame {
            Frame::Seq { rest, done, level } => {
                if let Some(id) = carry.take() {
                    done.push(id);
                }
                match rest.next() {
                    Some(child) => {
                        pending = Some((child, *level));
                        None
                    }
                    None => Some(build_list(&mut tree, done)),
                }
            }
            Frame::Map {
                rest,
                keys,
                done,
                level,
            } => {
                if let Some(id) = carry.take() {
                    done.push(id);
                }
                match rest.next() {
                    Some((key, child)) => {
                        keys.push(key.as_str());
                        pending = Some((child, *level));
                        None
                    }
                    None => Some(build_dict(&mut tree, keys, done)),
                }
            }
            Frame::Pair {
                tag,
                tail,
                head,
                level,
            } => {
                if head.is_none() {
                    *head = carry.take();
                    pending = tail.take().map(|t| (t, *level));
                    None
                } else {
                    let tail_id = carry.take().unwrap_or(NormTree::NULL);
                    let head_id = head.unwrap_or(NormTree::NULL);
                    Some(tree.alloc(NormNode::Pair {
                        tag: *tag,
                        head: head_id,
                        tail: tail_id,
                    }))
                }
            }
        };

        if let Some(id) = finished {
            stack.pop();
            carry = Some(id);
        }
    }
}

/// Recognise `{head, tail}` and `{_type, head, tail}` mappings.
fn linked_shape(map: &BTreeMap<String, Value>) -> Result<Option<(Option<TypeTag>, &Value, &Value)>> {
    let (Some(head), Some(tail)) = (map.get(HEAD_KEY), map.get(TAIL_KEY)) else {
        return Ok(None);
    };
    match (map.len(), map.get(TYPE_KEY)) {
        (2, None) => Ok(Some((None, head, tail))),
        (3, Some(raw)) => Ok(Some((Some(TypeTag::parse(raw)?), head, tail))),
        _ => Ok(None),
    }
}

fn build_list(tree: &mut NormTree, items: &[NodeId]) -> NodeId {
    let mut tail = NormTree::NULL;
    for (i, head) in items.iter().enumerate().rev() {
        let tag = (i == 0).then_some(TypeTag::List);
        tail = tree.alloc(NormNode::Pair {
            tag,
            head: *head,
            tail,
        });
    }
    tail
}

fn build_dict(tree: &mut NormTree, keys: &[&str], values: &[NodeId]) -> NodeId {
    let mut tail = NormTree::NULL;
    for (i, (key, value)) in keys.iter().zip(values).enumerate().rev() {
        let key_id = tree.alloc(NormNode::Str((*key).to_string()));
        let value_cell = tree.alloc(NormNode::Pair {
            tag: None,
            head: *value,
            tail: NormTree::NULL,
        });
        let entry = tree.alloc(NormNode::Pair {
            tag: None,
            head: key_id,
            tail: value_cell,
        });
        let tag = (i == 0).then_some(TypeTag::Dict);
        tail = tree.alloc(NormNode::Pair {
            tag,
            head: entry,
            tail,
        });
    }
    tail
}

/// Rebuild a value from the subtree at `id`.
///
/// Tagged lists and untagged null-terminated chains become sequences, tagged
/// dicts become mappings. Any other pair comes back as an explicit
/// `{head, tail}` (or `{_type, head, tail}`) mapping, so an untagged
/// user-written `{head, tail}` chain reads back as a sequence.
pub fn denormalize(tree: &NormTree, id: NodeId) -> Value {
    enum Frame {
        Seq {
            rest: std::vec::IntoIter<NodeId>,
            out: Vec<Value>,
        },
        Map {
            rest: std::vec::IntoIter<(String, NodeId)>,
            key: Option<String>,
            out: BTreeMap<String, Value>,
        },
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut pending = Some(id);
    let mut carry: Option<Value> = None;

    loop {
        if let Some(node_id) = pending.take() {
            match tree.node(node_id) {
                NormNode::Null => carry = Some(Value::Null),
                NormNode::Bool(b) => carry = Some(Value::Bool(*b)),
                NormNode::Number(n) => carry = Some(Value::Number(n.clone())),
                NormNode::Str(s) => carry = Some(Value::Str(s.clone())),
                NormNode::Var(name) => carry = Some(Value::var(name.clone())),
                NormNode::Pair { tag, head, tail } => {
                    let sequence = match tag {
                        Some(TypeTag::Dict) => None,
                        _ => tree.chain(node_id),
                    };
                    let mapping = match tag {
                        Some(TypeTag::Dict) => tree.dict_entries(node_id),
                        _ => None,
                    };
                    let frame = if let Some(heads) = sequence {
                        Frame::Seq {
                            out: Vec::with_capacity(heads.len()),
                            rest: heads.into_iter(),
                        }
                    } else if let Some(entries) = mapping {
                        Frame::Map {
                            rest: entries.into_iter(),
                            key: None,
                            out: BTreeMap::new(),
                        }
                    } else {
                        let mut out = BTreeMap::new();
                        if let Some(tag) = tag {
                            out.insert(TYPE_KEY.to_string(), Value::sym(tag.as_str()));
                        }
                        let fields = vec![
                            (HEAD_KEY.to_string(), *head),
                            (TAIL_KEY.to_string(), *tail),
                        ];
                        Frame::Map {
                            rest: fields.into_iter(),
                            key: None,
                            out,
                        }
                    };
                    stack.push(frame);
                }
            }
        }

        let Some(frame) = stack.last_mut() else {
            return carry.unwrap_or(Value::Null);
        };

        match frame {
            Frame::Seq { rest, out } => {
                if let Some(done) = carry.take() {
                    out.push(done);
                }
                match rest.next() {
                    Some(child) => pending = Some(child),
                    None => carry = Some(Value::Seq(std::mem::take(out))),
                }
            }
            Frame::Map { rest, key, out } => {
                if let (Some(done), Some(k)) = (carry.take(), key.take()) {
                    out.insert(k, done);
                }
                match rest.next() {
                    Some((k, child)) => {
                        *key = Some(k);
                        pending = Some(child);
                    }
                    None => carry = Some(Value::Map(std::mem::take(out))),
                }
            }
        }

        if pending.is_none() && carry.is_some() {
            stack.pop();
        }
    }
}

/// Structural equality of two subtrees, possibly from different arenas.
pub fn subtree_eq(a: &NormTree, a_id: NodeId, b: &NormTree, b_id: NodeId) -> bool {
    let mut pending = vec![(a_id, b_id)];
    while let Some((x, y)) = pending.pop() {
        match (a.node(x), b.node(y)) {
            (
                NormNode::Pair {
                    tag: tx,
                    head: hx,
                    tail: lx,
                },
                NormNode::Pair {
                    tag: ty,
                    head: hy,
                    tail: ly,
                },
            ) => {
                if tx != ty {
                    return false;
                }
                pending.push((*lx, *ly));
                pending.push((*hx, *hy));
            }
            (left, right) => {
                if left != right {
                    return false;
                }
            }
        }
    }
    true
}
