//! Snapshot inspection command
//!
//! Usage: rcx snapshot show <PATH>

use crate::commands::{read_file, CliResult};
use clap::{Args, Subcommand};
use rcx_core::program::render_term;
use rcx_core::snapshot::{compute_snapshot_digest, Snapshot};
use rcx_core::HaltReason;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Print a summary of a snapshot file
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub path: PathBuf,
}

pub fn execute(args: SnapshotArgs) -> CliResult {
    match args.command {
        SnapshotCommand::Show(show_args) => execute_show(show_args),
    }
}

fn execute_show(args: ShowArgs) -> CliResult {
    let snapshot = Snapshot::from_json_str(&read_file(&args.path)?)?;
    let state = &snapshot.state;

    let current = if state.halt_reason == Some(HaltReason::Completed) {
        "-".to_string()
    } else {
        render_term(&state.current)?
    };

    println!("schema: {}", snapshot.schema);
    println!("world: {}", snapshot.world);
    println!("digest: {}", compute_snapshot_digest(&snapshot)?);
    println!("rules: {}", snapshot.program.rules.len());
    if let Some(digest) = &snapshot.program.digest {
        println!("program_digest: {}", digest);
    }
    println!("status: {}", state.status);
    println!(
        "halt_reason: {}",
        state.halt_reason.map_or("-", HaltReason::as_str)
    );
    if let Some(error) = &state.error {
        println!("error: {}", error);
    }
    println!("step_counter: {}", state.step_counter);
    println!("current: {}", current);
    if let Some(route) = state.route {
        println!("route: {}", route);
    }
    println!(
        "buckets: ra={} lobes={} sink={} null_reg={} inf_reg={}",
        state.ra.len(),
        state.lobes.len(),
        state.sink.len(),
        state.null_reg.len(),
        state.inf_reg.len()
    );

    Ok(())
}
