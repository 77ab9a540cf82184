#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::program;
use rcx_core::errors::RcxError;
use rcx_core::logging_facility::test_capture::init_test_capture;
use rcx_core::rcx_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use rcx_core::{log_op_end, log_op_error, log_op_start, BudgetKind, Kernel, Limits, Value};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let ends: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();
    assert_eq!(ends.len(), 1, "Should have exactly one end event");
    assert_eq!(ends[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = RcxError::BudgetExceeded {
        kind: BudgetKind::Width,
        limit: 10,
        observed: 11,
    };
    log_op_error!(op_name, err, duration_ms = 1);

    let events = capture.events_for_op(op_name);
    let error_event = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");
    assert_eq!(error_event.field("err_code"), Some("ERR_BUDGET_EXCEEDED"));
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_4";

    log_op_start!(op_name, world = "pingpong");
    log_op_end!(op_name, duration_ms = 3, steps = 2u64);

    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END)
    });
    assert_eq!(starts, 1);
    assert_eq!(ends, 1);

    let start = &capture.events_for_op(op_name)[0];
    assert_eq!(start.field("world"), Some("pingpong"));
}

#[test]
fn test_kernel_steps_are_logged_with_index() {
    let capture = init_test_capture();
    let program = program("@log.unique.fix.5 PING -> rewrite(PONG)\n");

    Kernel::new(&program, Limits::default())
        .run(Value::sym("PING"))
        .unwrap();

    let fixes = capture.count_events(|e| {
        e.field("projection_id") == Some("log.unique.fix.5") && e.field("step_index") == Some("0")
    });
    assert_eq!(fixes, 1);
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();
    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}
