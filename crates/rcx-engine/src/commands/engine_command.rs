//! Engine-level commands.

use crate::commands::replay::{replay_trace, verify_world_trace, ReplayResult, VerifyResult};
use crate::commands::run::{resume_snapshot, run_world, ProgramSource, RunResult};
use rcx_core::snapshot::Snapshot;
use rcx_core::trace::WorldTrace;
use rcx_core::{Limits, Value};
use rcx_store::errors::Result;
use rcx_store::FsStore;
use serde_json::Value as Json;

/// Engine-level commands. Each may persist its artifacts when a store is
/// supplied to [`apply_engine_command`].
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Run a program from a seed value.
    Run {
        world: String,
        program: ProgramSource,
        seed: Value,
        limits: Limits,
    },
    /// Restore a snapshot and continue it, optionally under another program.
    Resume {
        snapshot: Box<Snapshot>,
        program: Option<ProgramSource>,
        limits: Option<Limits>,
    },
    /// Canonicalize and check a recorded event stream.
    Replay {
        events: Vec<Json>,
        expected: Option<Vec<Json>>,
    },
    /// Re-execute the program behind a world trace and compare.
    VerifyRun {
        trace: Box<WorldTrace>,
        program: ProgramSource,
        limits: Option<Limits>,
    },
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    Run(Box<RunResult>),
    Resume(Box<RunResult>),
    Replay(ReplayResult),
    VerifyRun(VerifyResult),
}

/// Apply an engine command.
pub fn apply_engine_command(
    cmd: EngineCommand,
    store: Option<&FsStore>,
) -> Result<EngineCommandResult> {
    match cmd {
        EngineCommand::Run {
            world,
            program,
            seed,
            limits,
        } => run_world(&world, &program, seed, &limits, store)
            .map(|r| EngineCommandResult::Run(Box::new(r))),
        EngineCommand::Resume {
            snapshot,
            program,
            limits,
        } => resume_snapshot(&snapshot, program.as_ref(), limits, store)
            .map(|r| EngineCommandResult::Resume(Box::new(r))),
        EngineCommand::Replay { events, expected } => {
            replay_trace(&events, expected.as_deref(), store).map(EngineCommandResult::Replay)
        }
        EngineCommand::VerifyRun {
            trace,
            program,
            limits,
        } => verify_world_trace(&trace, &program, limits).map(EngineCommandResult::VerifyRun),
    }
}
