//! Subcommands and the argument groups they share.

pub mod replay;
pub mod resume;
pub mod run;
pub mod snapshot;

use clap::Args;
use rcx_core::program::parse_term;
use rcx_core::snapshot::Snapshot;
use rcx_core::trace::{to_jsonl, CanonEvent};
use rcx_core::{Limits, Value};
use rcx_engine::commands::run::{ProgramSource, RunResult};
use rcx_store::FsStore;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_file(path: &Path, content: &str) -> Result<(), CliError> {
    std::fs::write(path, content).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Guardrail flags. `--limits` replaces the base limits; the single-field
/// flags then override on top.
#[derive(Debug, Args)]
pub struct LimitArgs {
    /// JSON file with any of max_depth, max_width, max_steps, max_stack_depth, cycle_window
    #[arg(long)]
    pub limits: Option<PathBuf>,

    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Size of the loop-detection history (0 disables it)
    #[arg(long)]
    pub cycle_window: Option<usize>,
}

impl LimitArgs {
    pub fn resolve(&self, base: Limits) -> Result<Limits, Box<dyn std::error::Error>> {
        let mut limits = match &self.limits {
            Some(path) => Limits::from_json_str(&read_file(path)?)?,
            None => base,
        };
        if let Some(max_steps) = self.max_steps {
            limits = limits.with_max_steps(max_steps);
        }
        if let Some(window) = self.cycle_window {
            limits = limits.with_cycle_window(window);
        }
        Ok(limits)
    }
}

/// `--rules` or `--projections`, at most one.
#[derive(Debug, Args)]
pub struct ProgramArgs {
    /// Rule file, one `pattern -> action` per line
    #[arg(long, conflicts_with = "projections")]
    pub rules: Option<PathBuf>,

    /// Projection file, a JSON array of {id, pattern, body}
    #[arg(long, conflicts_with = "rules")]
    pub projections: Option<PathBuf>,
}

impl ProgramArgs {
    pub fn source(&self) -> Result<Option<ProgramSource>, CliError> {
        if let Some(path) = &self.rules {
            return Ok(Some(ProgramSource::Rules(read_file(path)?)));
        }
        if let Some(path) = &self.projections {
            return Ok(Some(ProgramSource::Projections(read_file(path)?)));
        }
        Ok(None)
    }

    /// World name implied by the program file.
    pub fn file_stem(&self) -> Option<String> {
        self.rules
            .as_ref()
            .or(self.projections.as_ref())
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
    }
}

/// Where the artifacts of a run go besides stdout.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Write the final snapshot here
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,

    /// Write the world trace here as well as to stdout
    #[arg(long)]
    pub trace_out: Option<PathBuf>,

    /// Write the execution events here as JSONL
    #[arg(long)]
    pub exec_out: Option<PathBuf>,

    /// Content-addressed store directory for trace and snapshot
    #[arg(long)]
    pub store: Option<PathBuf>,
}

impl OutputArgs {
    pub fn store(&self) -> Option<FsStore> {
        self.store.as_ref().map(FsStore::new)
    }

    /// Print the world trace and write the requested files.
    pub fn emit(&self, result: &RunResult) -> CliResult {
        let trace_json = result.trace.to_json_pretty()?;
        println!("{}", trace_json);

        if let Some(path) = &self.trace_out {
            write_file(path, &format!("{}\n", trace_json))?;
        }
        if let Some(path) = &self.snapshot_out {
            write_snapshot(path, &result.snapshot)?;
        }
        if let Some(path) = &self.exec_out {
            write_events(path, &result.execution)?;
        }
        if let Some(stored) = &result.stored {
            eprintln!("stored world_trace {}", stored.world_trace);
            eprintln!("stored canon_trace {}", stored.canon_trace);
            if let Some(snapshot) = &stored.snapshot {
                eprintln!("stored snapshot {}", snapshot);
            }
        }
        Ok(())
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> CliResult {
    write_file(path, &format!("{}\n", snapshot.to_json_pretty()?))?;
    Ok(())
}

fn write_events(path: &Path, events: &[CanonEvent]) -> CliResult {
    write_file(path, &to_jsonl(events)?)?;
    Ok(())
}

pub fn parse_seed(text: &str) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(parse_term(text)?)
}
