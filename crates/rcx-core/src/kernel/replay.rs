use crate::errors::{RcxError, Result};
use crate::guardrails::Limits;
use crate::kernel::dispatch::Kernel;
use crate::kernel::state::RunState;
use crate::program::Program;
use crate::trace::TraceEvent;
use crate::value::Value;

/// Re-run `program` from `seed` and compare against a recorded trace.
///
/// Returns the fresh run state when every event matches.
///
/// # Errors
///
/// * `ReplayMismatch` - first index where the traces differ (or where one
///   ends early)
/// * any error rejecting the seed
pub fn verify_run(
    program: &Program,
    limits: &Limits,
    seed: Value,
    recorded: &[TraceEvent],
) -> Result<RunState> {
    let state = Kernel::new(program, limits.clone()).run(seed)?;
    compare_traces(recorded, &state.trace)?;
    Ok(state)
}

/// # Errors
///
/// Returns `ReplayMismatch` at the first differing event.
pub fn compare_traces(expected: &[TraceEvent], actual: &[TraceEvent]) -> Result<()> {
    for (index, (want, got)) in expected.iter().zip(actual).enumerate() {
        if !want.hash_matches()? {
            return Err(RcxError::ReplayMismatch {
                index,
                reason: "recorded content_hash does not match its payload".to_string(),
            });
        }
        if want != got {
            let reason = if want.phase != got.phase {
                format!("phase {} != {}", want.phase, got.phase)
            } else if want.content_hash != got.content_hash {
                format!("content_hash {} != {}", want.content_hash, got.content_hash)
            } else {
                "event fields differ".to_string()
            };
            return Err(RcxError::ReplayMismatch { index, reason });
        }
    }

    if expected.len() != actual.len() {
        return Err(RcxError::ReplayMismatch {
            index: expected.len().min(actual.len()),
            reason: format!(
                "recorded {} events, replay produced {}",
                expected.len(),
                actual.len()
            ),
        });
    }
    Ok(())
}
