//! Trace persistence layer.
//!
//! World trace documents are stored as canonical JSON; canonical event
//! streams are stored as JSONL exactly as `rcx replay` would emit them.

pub mod persist;

pub use persist::{load_canon_trace, load_world_trace, persist_canon_trace, persist_world_trace};
