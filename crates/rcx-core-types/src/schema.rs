//! Canonical schema constants for structured logging and wire formats
//!
//! These constants ensure consistency across logging, error reporting and
//! the JSON documents external tooling relies on.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_RUN_ID: &str = "run_id";
pub const FIELD_WORLD: &str = "world";

// Run identifiers
pub const FIELD_STEP_INDEX: &str = "step_index";
pub const FIELD_PROJECTION_ID: &str = "projection_id";
pub const FIELD_CONTENT_HASH: &str = "content_hash";

// Collection sizes
pub const FIELD_TRACE_LEN: &str = "trace_len";
pub const FIELD_RULE_COUNT: &str = "rule_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Wire schema identifiers
pub const WORLD_TRACE_SCHEMA_V1: &str = "rcx-world-trace.v1";
pub const SNAPSHOT_SCHEMA_V1: &str = "rcx.snapshot.v1";
pub const EXEC_SUMMARY_V: u64 = 1;
