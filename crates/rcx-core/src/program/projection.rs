use crate::errors::{RcxError, Result};
use crate::guardrails::{check_value, Limits};
use crate::normalize::{normalize, NormTree};
use crate::value::Value;

/// Id prefix reserved for kernel projections.
pub const KERNEL_PREFIX: &str = "kernel.";

/// A data-only rewrite rule `{id, pattern, body}`.
///
/// The pattern is normalized once when the projection is built; the body is
/// kept raw for substitution.
#[derive(Debug, Clone)]
pub struct Projection {
    pub id: String,
    pub pattern: Value,
    pub body: Value,
    pattern_tree: NormTree,
}

impl Projection {
    /// Validate and build a projection.
    ///
    /// # Errors
    ///
    /// * `SchemaViolation` - `id` is empty
    /// * `MalformedValue` - empty variable name or bad type tag in the pattern
    ///   or body
    /// * `BudgetExceeded` - pattern or body beyond the depth/width limits
    pub fn new(id: impl Into<String>, pattern: Value, body: Value, limits: &Limits) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RcxError::schema("projection id must be a non-empty string"));
        }
        let pattern_tree = normalize(&pattern, limits)?;
        check_value(&body, limits)?;
        check_var_names(&body)?;
        Ok(Self {
            id,
            pattern,
            body,
            pattern_tree,
        })
    }

    pub fn pattern_tree(&self) -> &NormTree {
        &self.pattern_tree
    }

    pub fn is_kernel(&self) -> bool {
        self.id.starts_with(KERNEL_PREFIX)
    }
}

/// Reject `{"var": ""}` anywhere in a value.
fn check_var_names(value: &Value) -> Result<()> {
    let mut stack = vec![value];
    while let Some(node) = stack.pop() {
        if node.as_var() == Some("") {
            return Err(RcxError::malformed("empty variable name"));
        }
        match node {
            Value::Seq(items) => stack.extend(items.iter()),
            Value::Map(map) => stack.extend(map.values()),
            _ => {}
        }
    }
    Ok(())
}
