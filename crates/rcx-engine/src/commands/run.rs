//! Run and resume orchestration.
//!
//! ## Pipeline (in order):
//! 1. Load the program (rule lines or projection JSON)
//! 2. Drive the kernel until the run leaves ACTIVE
//! 3. Shape the world trace v1, the snapshot and the execution events
//! 4. Persist trace and snapshot when a store is given
//!
//! Wall-clock time is read here, for log durations only; it never reaches a
//! trace or snapshot.

use rcx_core::canonical::value_hash;
use rcx_core::errors::{ExError, RcxError};
use rcx_core::kernel::{CancelToken, Kernel, RunState};
use rcx_core::snapshot::Snapshot;
use rcx_core::trace::{execution_events, CanonEvent, WorldTrace};
use rcx_core::{log_op_end, log_op_error, log_op_start};
use rcx_core::{HaltReason, Limits, Program, Value};
use rcx_core_types::{RunContext, RunId};
use rcx_store::errors::Result;
use rcx_store::{persist_run, FsStore, StoredRun};
use sha2::{Digest, Sha256};
use std::time::Instant;

/// Where a program comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramSource {
    /// Rule-line text, one `pattern -> action` per line.
    Rules(String),
    /// A JSON array of `{id, pattern, body}` projections.
    Projections(String),
}

impl ProgramSource {
    pub fn load(&self, limits: &Limits) -> Result<Program> {
        let loaded = match self {
            ProgramSource::Rules(text) => Program::parse(text, limits),
            ProgramSource::Projections(text) => Program::from_projection_json(text, limits),
        };
        loaded.map_err(|e| ExError::from(e).with_op("load_program"))
    }
}

/// Everything a finished (or stalled) run produces.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: RunId,
    pub trace: WorldTrace,
    pub snapshot: Snapshot,
    /// v2 execution events derived from the kernel trace.
    pub execution: Vec<CanonEvent>,
    pub stored: Option<StoredRun>,
}

/// Correlation context for a run: the id is derived from the program digest
/// and the starting value, so the same inputs always share an id.
pub fn run_context(world: &str, program: &Program, start: &Value) -> Result<RunContext> {
    let program_digest = program.digest().map_err(ExError::from)?;
    let start_hash = value_hash(start).map_err(ExError::from)?;
    let mut hasher = Sha256::new();
    hasher.update(program_digest.as_bytes());
    hasher.update(b"\n");
    hasher.update(start_hash.as_bytes());
    Ok(RunContext::new(world, &hex::encode(hasher.finalize())))
}

/// Run a program from `seed`.
///
/// Step errors do not fail the command: they end the run with halt reason
/// `error` and are reported in the world trace.
///
/// # Errors
///
/// Returns an error if the program does not load, the seed is rejected, or
/// persistence fails.
pub fn run_world(
    world: &str,
    source: &ProgramSource,
    seed: Value,
    limits: &Limits,
    store: Option<&FsStore>,
) -> Result<RunResult> {
    run_world_with_cancel(world, source, seed, limits, store, None)
}

/// [`run_world`] with a cancellation token checked between steps.
///
/// # Errors
///
/// See [`run_world`].
pub fn run_world_with_cancel(
    world: &str,
    source: &ProgramSource,
    seed: Value,
    limits: &Limits,
    store: Option<&FsStore>,
    cancel: Option<CancelToken>,
) -> Result<RunResult> {
    log_op_start!("run_world", world = world);
    let start = Instant::now();

    let result = run_world_impl(world, source, seed, limits, store, cancel).map_err(|e| {
        log_op_error!(
            "run_world",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "run_world",
        duration_ms = start.elapsed().as_millis() as u64,
        run_id = %result.run_id,
        steps = result.trace.steps
    );

    Ok(result)
}

fn run_world_impl(
    world: &str,
    source: &ProgramSource,
    seed: Value,
    limits: &Limits,
    store: Option<&FsStore>,
    cancel: Option<CancelToken>,
) -> Result<RunResult> {
    let program = source.load(limits)?;
    let ctx = run_context(world, &program, &seed)?;

    let mut kernel = Kernel::new(&program, limits.clone());
    if let Some(token) = cancel {
        kernel = kernel.with_cancel(token);
    }
    let state = kernel
        .run(seed.clone())
        .map_err(|e| in_run(e, "run_world", &ctx))?;

    finish(ctx, seed, &program, limits, &state, store)
}

/// Restore a snapshot and continue it.
///
/// A stalled run may be continued under a different program by passing
/// `program`; otherwise the snapshot's own rules are used. `limits`
/// overrides the guardrails stored in the snapshot. The world trace of a
/// resumed run records the value the run resumed from as its `seed`.
///
/// # Errors
///
/// Returns `SchemaViolation` for an inconsistent snapshot, program load
/// errors, or persistence errors.
pub fn resume_snapshot(
    snapshot: &Snapshot,
    program: Option<&ProgramSource>,
    limits: Option<Limits>,
    store: Option<&FsStore>,
) -> Result<RunResult> {
    log_op_start!("resume_snapshot", world = &snapshot.world);
    let start = Instant::now();

    let result = resume_snapshot_impl(snapshot, program, limits, store).map_err(|e| {
        log_op_error!(
            "resume_snapshot",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "resume_snapshot",
        duration_ms = start.elapsed().as_millis() as u64,
        run_id = %result.run_id,
        steps = result.trace.steps
    );

    Ok(result)
}

fn resume_snapshot_impl(
    snapshot: &Snapshot,
    program: Option<&ProgramSource>,
    limits: Option<Limits>,
    store: Option<&FsStore>,
) -> Result<RunResult> {
    let restored = snapshot
        .restore(limits)
        .map_err(|e| ExError::from(e).with_op("resume_snapshot"))?;
    let program = match program {
        Some(source) => source.load(&restored.limits)?,
        None => restored.program,
    };

    let mut state = restored.state;
    let resumed_from = state.current.clone().unwrap_or(Value::Null);
    let ctx = run_context(&snapshot.world, &program, &resumed_from)?;

    Kernel::new(&program, restored.limits.clone()).resume(&mut state);

    finish(ctx, resumed_from, &program, &restored.limits, &state, store)
}

fn finish(
    ctx: RunContext,
    seed: Value,
    program: &Program,
    limits: &Limits,
    state: &RunState,
    store: Option<&FsStore>,
) -> Result<RunResult> {
    if state.halt_reason == Some(HaltReason::Error) {
        tracing::warn!(
            run_id = %ctx.run_id,
            step = state.step_counter,
            error = state.error.as_deref().unwrap_or_default(),
            "run halted on error"
        );
    }

    let trace = WorldTrace::from_run(&ctx.world, seed, limits, state);
    let snapshot = Snapshot::capture(&ctx.world, program, limits, state)
        .map_err(|e| in_run(e, "capture_snapshot", &ctx))?;
    let execution = execution_events(&state.trace)
        .map_err(|e| in_run(e, "execution_events", &ctx))?
        .into_events();
    let stored = store
        .map(|s| persist_run(s, &trace, Some(&snapshot)))
        .transpose()
        .map_err(|e| e.with_run_id(ctx.run_id.clone()))?;

    Ok(RunResult {
        run_id: ctx.run_id,
        trace,
        snapshot,
        execution,
        stored,
    })
}

fn in_run(err: RcxError, op: &str, ctx: &RunContext) -> ExError {
    ExError::from(err)
        .with_op(op)
        .with_run_id(ctx.run_id.clone())
}
