//! Replay command
//!
//! Usage: rcx replay --trace <P> [--out <P>] [--expect <P>] [--check-canon]
//!        [--print-exec-summary] [--rules <P> | --projections <P>]
//!
//! Exit codes: 0 on success, 1 when the replay diverges (`REPLAY_MISMATCH`)
//! or execution events break the stall/fix cycle, 2 when a file is missing
//! or does not canonicalize.

use crate::commands::{read_file, write_file, CliError, CliResult, ProgramArgs};
use clap::Args;
use rcx_core::errors::{ExError, ExErrorKind};
use rcx_core::trace::WorldTrace;
use rcx_engine::commands::replay::raw_events_from_text;
use rcx_engine::{apply_engine_command, EngineCommand, EngineCommandResult};
use rcx_store::FsStore;
use std::path::PathBuf;
use thiserror::Error;

/// A replay failure with the process exit code it maps to.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ReplayExit {
    pub code: i32,
    pub message: String,
}

impl ReplayExit {
    fn input(message: impl Into<String>) -> Self {
        Self {
            code: 2,
            message: message.into(),
        }
    }
}

impl From<CliError> for ReplayExit {
    fn from(err: CliError) -> Self {
        ReplayExit::input(err.to_string())
    }
}

impl From<ExError> for ReplayExit {
    fn from(err: ExError) -> Self {
        let code = match err.kind() {
            ExErrorKind::ReplayMismatch | ExErrorKind::ExecutionState => 1,
            _ => 2,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// World trace JSON, JSON array of events, or JSONL
    #[arg(long)]
    pub trace: PathBuf,

    /// Write the canonical JSONL here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Trace the replay must reproduce exactly
    #[arg(long)]
    pub expect: Option<PathBuf>,

    /// Fail unless the input JSONL is already canonical
    #[arg(long)]
    pub check_canon: bool,

    /// Print the execution summary as JSON
    #[arg(long)]
    pub print_exec_summary: bool,

    /// Store the canonical JSONL in this content-addressed store
    #[arg(long)]
    pub store: Option<PathBuf>,

    #[command(flatten)]
    pub program: ProgramArgs,
}

pub fn execute(args: ReplayArgs) -> CliResult {
    replay(args)?;
    Ok(())
}

fn replay(args: ReplayArgs) -> Result<(), ReplayExit> {
    let text = read_file(&args.trace)?;
    let events = raw_events_from_text(&text)?;
    let expected = match &args.expect {
        Some(path) => Some(raw_events_from_text(&read_file(path)?)?),
        None => None,
    };

    let store = args.store.as_ref().map(FsStore::new);
    let cmd = EngineCommand::Replay { events, expected };
    let EngineCommandResult::Replay(result) = apply_engine_command(cmd, store.as_ref())? else {
        return Err(ReplayExit::input("engine returned an unexpected result for replay"));
    };

    if args.check_canon {
        check_canon(&text, &result.jsonl)?;
    }

    if let Some(source) = args.program.source()? {
        let recorded = WorldTrace::from_json_str(&text)
            .map_err(|e| ReplayExit::input(format!("re-execution needs a world trace: {}", e)))?;
        let cmd = EngineCommand::VerifyRun {
            trace: Box::new(recorded),
            program: source,
            limits: None,
        };
        apply_engine_command(cmd, None)?;
    }

    match &args.out {
        Some(path) => write_file(path, &result.jsonl)?,
        None if !args.print_exec_summary => print!("{}", result.jsonl),
        None => {}
    }

    if args.print_exec_summary {
        let summary = serde_json::to_string(&result.summary)
            .map_err(|e| ReplayExit::input(e.to_string()))?;
        println!("{}", summary);
    }

    if let Some(digest) = &result.stored {
        eprintln!("stored canon_trace {}", digest);
    }

    Ok(())
}

/// The input must be exactly the canonical JSONL, blank lines aside.
fn check_canon(input: &str, canonical: &str) -> Result<(), ReplayExit> {
    let mut given = input.lines().filter(|l| !l.trim().is_empty());
    for (index, want) in canonical.lines().enumerate() {
        match given.next() {
            Some(line) if line == want => {}
            Some(_) => {
                return Err(ReplayExit::input(format!(
                    "line {} is not canonical; expected {}",
                    index + 1,
                    want
                )))
            }
            None => {
                return Err(ReplayExit::input(format!(
                    "input ends before canonical line {}",
                    index + 1
                )))
            }
        }
    }
    if given.next().is_some() {
        return Err(ReplayExit::input("input has lines past the canonical trace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_canon_accepts_identical() {
        let canon = "{\"v\":1,\"type\":\"a\",\"i\":0}\n";
        assert!(check_canon(canon, canon).is_ok());
    }

    #[test]
    fn test_check_canon_rejects_reordered_keys() {
        let canon = "{\"v\":1,\"type\":\"a\",\"i\":0}\n";
        let input = "{\"i\":0,\"type\":\"a\",\"v\":1}\n";
        let err = check_canon(input, canon).unwrap_err();
        assert_eq!(err.code, 2);
    }

    #[test]
    fn test_exit_codes() {
        let mismatch = ExError::new(ExErrorKind::ReplayMismatch);
        let schema = ExError::new(ExErrorKind::SchemaViolation);
        assert_eq!(ReplayExit::from(mismatch).code, 1);
        assert_eq!(ReplayExit::from(schema).code, 2);
    }
}
