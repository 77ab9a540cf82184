//! Resume command
//!
//! Usage: rcx resume --snapshot <P> [--rules <P> | --projections <P>]

use crate::commands::{read_file, CliResult, LimitArgs, OutputArgs, ProgramArgs};
use clap::Args;
use rcx_core::snapshot::Snapshot;
use rcx_engine::{apply_engine_command, EngineCommand, EngineCommandResult};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Snapshot file written by `rcx run --snapshot-out`
    #[arg(long)]
    pub snapshot: PathBuf,

    // Continue under this program instead of the snapshot's own rules
    #[command(flatten)]
    pub program: ProgramArgs,

    #[command(flatten)]
    pub limits: LimitArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn execute(args: ResumeArgs) -> CliResult {
    let snapshot = Snapshot::from_json_str(&read_file(&args.snapshot)?)?;
    let base = snapshot.limits.clone().unwrap_or_default();
    let limits = args.limits.resolve(base)?;

    let store = args.output.store();
    let cmd = EngineCommand::Resume {
        snapshot: Box::new(snapshot),
        program: args.program.source()?,
        limits: Some(limits),
    };
    let EngineCommandResult::Resume(result) = apply_engine_command(cmd, store.as_ref())? else {
        return Err("engine returned an unexpected result for resume".into());
    };

    args.output.emit(&result)
}
