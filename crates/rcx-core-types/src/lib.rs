//! Core types shared across rcx facilities
//!
//! This crate provides foundational types used by the error handling,
//! logging and wire-format layers:
//!
//! - **Correlation types**: RunId, RunContext
//! - **Schema constants**: Canonical field keys, event names and wire schema ids

pub mod correlation;
pub mod schema;

pub use correlation::{RunContext, RunId};
