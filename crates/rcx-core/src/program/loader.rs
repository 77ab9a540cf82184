//! Projection file loading.
//!
//! A projection file is a JSON array of `{id, pattern, body}` objects. All
//! three keys are required and no others are accepted.

use crate::canonical::json_from_str;
use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use crate::program::projection::Projection;
use crate::value::Value;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectionRecord {
    id: String,
    pattern: Value,
    body: Value,
}

/// Parse and validate a projection file, keeping declared order.
///
/// # Errors
///
/// * `SchemaViolation` - not an array of well-formed records
/// * `MalformedValue` / `BudgetExceeded` - a pattern or body fails validation
pub fn load_projections(text: &str, limits: &Limits) -> Result<Vec<Projection>> {
    let records: Vec<ProjectionRecord> = json_from_str(text)
        .map_err(|e| RcxError::schema(format!("projection file: {}", e)))?;

    records
        .into_iter()
        .map(|record| Projection::new(record.id, record.pattern, record.body, limits))
        .collect()
}
