//! rcx CLI
//!
//! Command-line interface for the rcx evaluator

use clap::{Parser, Subcommand};
use rcx_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "rcx")]
#[command(about = "rcx - Deterministic term-rewriting evaluator", long_about = None)]
struct Cli {
    /// Human-readable debug logs on stderr instead of JSON
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a program from a seed term and print the world trace
    Run(commands::run::RunArgs),
    /// Continue a run from a snapshot
    Resume(commands::resume::ResumeArgs),
    /// Canonicalize and check a recorded trace
    Replay(commands::replay::ReplayArgs),
    /// Snapshot inspection
    Snapshot(commands::snapshot::SnapshotArgs),
}

fn main() {
    let cli = Cli::parse();
    init(if cli.verbose {
        Profile::Development
    } else {
        Profile::Production
    });

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Resume(args) => commands::resume::execute(args),
        Commands::Replay(args) => commands::replay::execute(args),
        Commands::Snapshot(args) => commands::snapshot::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = e
            .downcast_ref::<commands::replay::ReplayExit>()
            .map_or(1, |exit| exit.code);
        std::process::exit(code);
    }
}
