//! Terminal routing.
//!
//! Classifier rules are checked in declared order; the first one whose pattern
//! matches assigns the bucket. When none matches, [`structural_bucket`]
//! decides from the value's shape alone.

use crate::errors::Result;
use crate::guardrails::Limits;
use crate::matcher::match_nodes;
use crate::normalize::{normalize, NormTree};
use crate::traversal::Mode;
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Stable, accepted.
    Ra,
    /// Coherent but incomplete.
    Lobe,
    /// Contradictory.
    Sink,
    NullReg,
    InfReg,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Ra,
        Bucket::Lobe,
        Bucket::Sink,
        Bucket::NullReg,
        Bucket::InfReg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Ra => "ra",
            Bucket::Lobe => "lobe",
            Bucket::Sink => "sink",
            Bucket::NullReg => "null_reg",
            Bucket::InfReg => "inf_reg",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == name)
    }

    /// Reserved hemispheres are only reachable through explicit rules.
    pub fn is_reserved(self) -> bool {
        matches!(self, Bucket::NullReg | Bucket::InfReg)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `pattern -> bucket`, with the pattern normalized once at load.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub id: String,
    pub pattern: Value,
    pub bucket: Bucket,
    pattern_tree: NormTree,
}

impl ClassifierRule {
    /// # Errors
    ///
    /// Returns `MalformedValue` or `BudgetExceeded` if the pattern fails
    /// normalization.
    pub fn new(
        id: impl Into<String>,
        pattern: Value,
        bucket: Bucket,
        limits: &Limits,
    ) -> Result<Self> {
        let pattern_tree = normalize(&pattern, limits)?;
        Ok(Self {
            id: id.into(),
            pattern,
            bucket,
            pattern_tree,
        })
    }

    /// # Errors
    ///
    /// Returns `BudgetExceeded{Stack}` if matching overflows the work stack.
    pub fn matches(&self, value: &NormTree, limits: &Limits) -> Result<bool> {
        Ok(match_nodes(Mode::Classify, &self.pattern_tree, value, limits)?.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub bucket: Bucket,
    /// Rule that assigned the bucket; `None` for the structural default.
    pub rule_id: Option<String>,
}

/// Assign exactly one bucket to a value.
///
/// # Errors
///
/// Propagates matcher budget errors.
pub fn classify<'r>(
    rules: impl IntoIterator<Item = &'r ClassifierRule>,
    value: &Value,
    tree: &NormTree,
    limits: &Limits,
) -> Result<Classification> {
    for rule in rules {
        if rule.matches(tree, limits)? {
            return Ok(Classification {
                bucket: rule.bucket,
                rule_id: Some(rule.id.clone()),
            });
        }
    }
    Ok(Classification {
        bucket: structural_bucket(value),
        rule_id: None,
    })
}

/// Default routing by shape.
pub fn structural_bucket(value: &Value) -> Bucket {
    match value {
        Value::Seq(items) => match items.first().and_then(Value::as_str) {
            Some("UNSTABLE") => Bucket::Lobe,
            Some("PARADOX") => Bucket::Sink,
            _ => by_children(items.iter()),
        },
        Value::Map(map) => by_children(map.values()),
        _ => Bucket::Ra,
    }
}

fn by_children<'a>(children: impl ExactSizeIterator<Item = &'a Value>) -> Bucket {
    if children.len() <= 1 {
        return Bucket::Lobe;
    }
    let mut symbols = children.map(Value::as_str);
    let first = symbols.next().flatten();
    match first {
        Some(sym) if symbols.all(|s| s == Some(sym)) => Bucket::Lobe,
        _ => Bucket::Sink,
    }
}
