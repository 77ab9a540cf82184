//! Run command
//!
//! Usage: rcx run (--rules <P> | --projections <P>) --seed <TERM> [--world NAME]

use crate::commands::{parse_seed, CliResult, LimitArgs, OutputArgs, ProgramArgs};
use clap::Args;
use rcx_core::Limits;
use rcx_engine::{apply_engine_command, EngineCommand, EngineCommandResult};

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub program: ProgramArgs,

    /// Seed term, e.g. `[null, a]` or `PING`
    #[arg(long)]
    pub seed: String,

    /// World name recorded in the trace (defaults to the program file name)
    #[arg(long)]
    pub world: Option<String>,

    #[command(flatten)]
    pub limits: LimitArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn execute(args: RunArgs) -> CliResult {
    let program = args
        .program
        .source()?
        .ok_or("Must specify either --rules or --projections")?;
    let seed = parse_seed(&args.seed)?;
    let limits = args.limits.resolve(Limits::default())?;
    let world = args
        .world
        .clone()
        .or_else(|| args.program.file_stem())
        .unwrap_or_else(|| "world".to_string());

    let store = args.output.store();
    let cmd = EngineCommand::Run {
        world,
        program,
        seed,
        limits,
    };
    let EngineCommandResult::Run(result) = apply_engine_command(cmd, store.as_ref())? else {
        return Err("engine returned an unexpected result for run".into());
    };

    args.output.emit(&result)
}
