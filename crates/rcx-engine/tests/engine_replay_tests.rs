#![allow(clippy::unwrap_used, clippy::expect_used)]
// Replay and verify-run orchestration

mod common;

use common::{expect_run, f_of, setup_store, NEEDS_Y, PASS_X, PINGPONG};
use rcx_core::errors::ExErrorKind;
use rcx_core::trace::ExecStatus;
use rcx_core::{Limits, Value};
use rcx_engine::commands::replay::raw_events_from_text;
use rcx_engine::commands::run::{run_world, ProgramSource, RunResult};
use rcx_engine::{apply_engine_command, EngineCommand, EngineCommandResult};
use rcx_store::trace::load_canon_trace;
use serde_json::json;

fn pingpong() -> RunResult {
    run_world(
        "pingpong",
        &ProgramSource::Rules(PINGPONG.to_string()),
        Value::sym("PING"),
        &Limits::default(),
        None,
    )
    .unwrap()
}

fn replay(events: Vec<serde_json::Value>, expected: Option<Vec<serde_json::Value>>) -> EngineCommand {
    EngineCommand::Replay { events, expected }
}

#[test]
fn test_replay_world_trace_document() {
    // Given: A world trace written as pretty JSON
    let text = pingpong().trace.to_json_pretty().unwrap();

    // When: It is replayed
    let raw = raw_events_from_text(&text).unwrap();
    let EngineCommandResult::Replay(result) =
        apply_engine_command(replay(raw, None), None).unwrap()
    else {
        panic!("expected replay result");
    };

    // Then: Each kernel step is one canonical v1 event
    assert_eq!(result.events.len(), 2);
    assert_eq!(result.events[0].kind, "kernel.fix");
    assert_eq!(result.events[1].kind, "kernel.closure");
    assert_eq!(result.jsonl.lines().count(), 2);
    assert_eq!(result.summary.final_status, ExecStatus::Active);
    assert_eq!(result.summary.counts.stall, 0);
}

#[test]
fn test_replay_is_idempotent() {
    let raw = raw_events_from_text(&pingpong().trace.to_json_pretty().unwrap()).unwrap();
    let EngineCommandResult::Replay(first) = apply_engine_command(replay(raw, None), None).unwrap()
    else {
        panic!("expected replay result");
    };

    let again = raw_events_from_text(&first.jsonl).unwrap();
    let EngineCommandResult::Replay(second) =
        apply_engine_command(replay(again, None), None).unwrap()
    else {
        panic!("expected replay result");
    };

    assert_eq!(first.jsonl, second.jsonl);
}

#[test]
fn test_replay_summarizes_execution_events() {
    let stalled = run_world(
        "stall",
        &ProgramSource::Rules(NEEDS_Y.to_string()),
        f_of(1),
        &Limits::default(),
        None,
    )
    .unwrap();
    let resumed = expect_run(
        apply_engine_command(
            EngineCommand::Resume {
                snapshot: Box::new(stalled.snapshot),
                program: Some(ProgramSource::Rules(PASS_X.to_string())),
                limits: None,
            },
            None,
        )
        .unwrap(),
    );

    let raw = resumed
        .execution
        .iter()
        .map(|e| serde_json::to_value(e).unwrap())
        .collect();
    let EngineCommandResult::Replay(result) = apply_engine_command(replay(raw, None), None).unwrap()
    else {
        panic!("expected replay result");
    };

    let summary = serde_json::to_value(&result.summary).unwrap();
    assert_eq!(
        summary,
        json!({"v": 1, "counts": {"stall": 1, "fix": 1, "fixed": 1}, "final_status": "ACTIVE"})
    );
}

#[test]
fn test_replay_rejects_gap() {
    let raw = vec![json!({"type": "a", "i": 0}), json!({"type": "b", "i": 2})];
    let err = apply_engine_command(replay(raw, None), None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::SchemaViolation);
}

#[test]
fn test_replay_rejects_out_of_order_execution() {
    let raw = vec![json!({
        "v": 2, "type": "execution.fixed", "i": 0, "t": "r",
        "mu": {"before_hash": "a", "after_hash": "b"}
    })];
    let err = apply_engine_command(replay(raw, None), None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ExecutionState);
}

#[test]
fn test_replay_expect_mismatch() {
    let raw = vec![json!({"type": "a", "i": 0}), json!({"type": "b", "i": 1})];
    let expected = vec![json!({"type": "a", "i": 0}), json!({"type": "c", "i": 1})];

    let err = apply_engine_command(replay(raw.clone(), Some(expected)), None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ReplayMismatch);
    assert!(err.message().contains("event 1"));

    assert!(apply_engine_command(replay(raw.clone(), Some(raw)), None).is_ok());
}

#[test]
fn test_replay_persists_canonical_jsonl() {
    let (store, _dir) = setup_store();
    let raw = raw_events_from_text(&pingpong().trace.to_json_pretty().unwrap()).unwrap();

    let EngineCommandResult::Replay(result) =
        apply_engine_command(replay(raw, None), Some(&store)).unwrap()
    else {
        panic!("expected replay result");
    };

    let digest = result.stored.unwrap();
    assert_eq!(load_canon_trace(&store, &digest).unwrap(), result.events);
}

#[test]
fn test_verify_run_matches() {
    let recorded = pingpong().trace;
    let cmd = EngineCommand::VerifyRun {
        trace: Box::new(recorded.clone()),
        program: ProgramSource::Rules(PINGPONG.to_string()),
        limits: None,
    };

    let EngineCommandResult::VerifyRun(result) = apply_engine_command(cmd, None).unwrap() else {
        panic!("expected verify result");
    };
    assert_eq!(result.trace.trace, recorded.trace);
}

#[test]
fn test_verify_run_detects_divergence() {
    let recorded = pingpong().trace;
    let cmd = EngineCommand::VerifyRun {
        trace: Box::new(recorded),
        program: ProgramSource::Rules("PING -> rewrite(PONG)\nPONG -> lobe\n".to_string()),
        limits: None,
    };

    let err = apply_engine_command(cmd, None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ReplayMismatch);
    assert_eq!(err.op(), Some("verify_run"));
}
