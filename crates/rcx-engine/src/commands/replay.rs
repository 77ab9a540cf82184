//! Replay orchestration.
//!
//! Two flavours:
//! - [`replay_trace`] canonicalizes a stored event stream, re-checks `i`
//!   contiguity, replays its execution events and optionally compares it to
//!   an expected stream
//! - [`verify_world_trace`] re-executes the program behind a world trace and
//!   compares the fresh kernel trace with the recorded one
//!
//! Discrepancies are reported, never repaired.

use crate::commands::run::{run_context, ProgramSource};
use rcx_core::canonical::json_from_str;
use rcx_core::errors::{ExError, RcxError};
use rcx_core::kernel::verify_run;
use rcx_core::trace::{
    canon_events, exec_summary, read_jsonl, to_jsonl, CanonEvent, ExecSummary, WorldTrace,
};
use rcx_core::{log_op_end, log_op_error, log_op_start, Limits};
use rcx_core_types::schema::WORLD_TRACE_SCHEMA_V1;
use rcx_core_types::RunId;
use rcx_store::errors::Result;
use rcx_store::trace::persist_canon_trace;
use rcx_store::FsStore;
use serde_json::Value as Json;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ReplayResult {
    pub events: Vec<CanonEvent>,
    /// The canonical stream as newline-terminated JSONL.
    pub jsonl: String,
    pub summary: ExecSummary,
    /// CAS digest of `jsonl`, when a store was given.
    pub stored: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub run_id: RunId,
    /// World trace of the fresh run; identical in `trace` to the recorded one.
    pub trace: WorldTrace,
}

/// Decode trace file text into raw event objects.
///
/// Accepts a world trace v1 document (its kernel steps become v1 canonical
/// events), a JSON array of events, or JSONL with one event per line.
///
/// # Errors
///
/// Returns `SchemaViolation` for text that is none of those.
pub fn raw_events_from_text(text: &str) -> Result<Vec<Json>> {
    raw_events(text).map_err(|e| ExError::from(e).with_op("read_trace"))
}

fn raw_events(text: &str) -> rcx_core::Result<Vec<Json>> {
    match json_from_str::<Json>(text) {
        Ok(Json::Array(events)) => Ok(events),
        Ok(Json::Object(doc))
            if doc.get("schema").and_then(Json::as_str) == Some(WORLD_TRACE_SCHEMA_V1) =>
        {
            let trace = WorldTrace::from_json_str(text)?;
            trace
                .canon_events()
                .iter()
                .map(|event| serde_json::to_value(event).map_err(RcxError::from))
                .collect()
        }
        _ => read_jsonl(text),
    }
}

/// Canonicalize and check a recorded event stream.
///
/// # Errors
///
/// * `SchemaViolation` - a malformed event or a gap/reordering in `i`
/// * `ExecutionState` - execution events out of order
/// * `ReplayMismatch` - the stream differs from `expected`
pub fn replay_trace(
    raw: &[Json],
    expected: Option<&[Json]>,
    store: Option<&FsStore>,
) -> Result<ReplayResult> {
    log_op_start!("replay_trace", event_count = raw.len());
    let start = Instant::now();

    let result = replay_trace_impl(raw, expected, store).map_err(|e| {
        log_op_error!(
            "replay_trace",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "replay_trace",
        duration_ms = start.elapsed().as_millis() as u64,
        final_status = result.summary.final_status.as_str()
    );

    Ok(result)
}

fn replay_trace_impl(
    raw: &[Json],
    expected: Option<&[Json]>,
    store: Option<&FsStore>,
) -> Result<ReplayResult> {
    let core = |e: RcxError| ExError::from(e).with_op("replay_trace");

    let events = canon_events(raw).map_err(core)?;
    if let Some(expected) = expected {
        let expected = canon_events(expected).map_err(core)?;
        compare_canon(&expected, &events).map_err(core)?;
    }
    let summary = exec_summary(&events).map_err(core)?;
    let jsonl = to_jsonl(&events).map_err(core)?;
    let stored = store
        .map(|s| persist_canon_trace(s, &events))
        .transpose()?;

    Ok(ReplayResult {
        events,
        jsonl,
        summary,
        stored,
    })
}

/// First index where two canonical streams differ.
///
/// # Errors
///
/// Returns `ReplayMismatch` at the first differing event, or at the end of
/// the shorter stream.
pub fn compare_canon(expected: &[CanonEvent], actual: &[CanonEvent]) -> rcx_core::Result<()> {
    if let Some(index) = expected.iter().zip(actual).position(|(a, b)| a != b) {
        let (want, got) = (&expected[index], &actual[index]);
        let reason = if want.kind != got.kind {
            format!("type {} != {}", want.kind, got.kind)
        } else {
            "event fields differ".to_string()
        };
        return Err(RcxError::ReplayMismatch { index, reason });
    }
    if expected.len() != actual.len() {
        return Err(RcxError::ReplayMismatch {
            index: expected.len().min(actual.len()),
            reason: format!(
                "expected {} events, got {}",
                expected.len(),
                actual.len()
            ),
        });
    }
    Ok(())
}

/// Re-run the program behind a world trace from its seed and compare.
///
/// Without explicit `limits`, the defaults apply with the trace's own
/// `max_steps`.
///
/// # Errors
///
/// * `SchemaViolation` - the world trace is inconsistent
/// * `ReplayMismatch` - the fresh trace diverges from the recorded one
pub fn verify_world_trace(
    recorded: &WorldTrace,
    source: &ProgramSource,
    limits: Option<Limits>,
) -> Result<VerifyResult> {
    log_op_start!("verify_run", world = &recorded.world);
    let start = Instant::now();

    let result = verify_world_trace_impl(recorded, source, limits).map_err(|e| {
        log_op_error!(
            "verify_run",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "verify_run",
        duration_ms = start.elapsed().as_millis() as u64,
        run_id = %result.run_id
    );

    Ok(result)
}

fn verify_world_trace_impl(
    recorded: &WorldTrace,
    source: &ProgramSource,
    limits: Option<Limits>,
) -> Result<VerifyResult> {
    recorded
        .validate()
        .map_err(|e| ExError::from(e).with_op("verify_run"))?;
    let limits = limits.unwrap_or_else(|| Limits::default().with_max_steps(recorded.max_steps));
    let program = source.load(&limits)?;
    let ctx = run_context(&recorded.world, &program, &recorded.seed)?;

    let state = verify_run(&program, &limits, recorded.seed.clone(), &recorded.trace).map_err(
        |e| {
            ExError::from(e)
                .with_op("verify_run")
                .with_run_id(ctx.run_id.clone())
        },
    )?;

    Ok(VerifyResult {
        trace: WorldTrace::from_run(&ctx.world, recorded.seed.clone(), &limits, &state),
        run_id: ctx.run_id,
    })
}
