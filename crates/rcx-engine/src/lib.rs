//! rcx Engine - Orchestration layer
//!
//! Provides high-level commands that drive the kernel, shape its output into
//! world traces and snapshots, and hand artifacts to the store.

pub mod commands;

pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
