//! Command orchestration layer.
//!
//! Provides high-level command functions that coordinate between
//! the kernel and the persistence layer.

pub mod engine_command;
pub mod replay;
pub mod run;
