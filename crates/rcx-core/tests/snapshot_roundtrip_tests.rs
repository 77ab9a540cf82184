#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::int_seq;
use rcx_core::snapshot::compute_snapshot_digest;
use rcx_core::{BudgetKind, HaltReason, Kernel, Limits, Program, RcxError, RunState, Snapshot, Value};

const DROP_HEADS: &str = r#"@drop {"_type": "list", "head": {"var": "h"}, "tail": {"var": "t"}} -> rewrite(?t)
null -> sink
"#;

const FLIP: &str = "A -> rewrite(B)\nB -> rewrite(A)\n";

/// Step `k` times, snapshot through text, restore and resume.
fn interrupted(rules: &str, limits: &Limits, seed: &Value, k: usize) -> RunState {
    let program = Program::parse(rules, limits).unwrap();
    let kernel = Kernel::new(&program, limits.clone());
    let mut state = kernel.start(seed.clone()).unwrap();
    for _ in 0..k {
        if !state.is_active() {
            break;
        }
        kernel.step(&mut state).unwrap();
    }

    let text = Snapshot::capture("interrupted", &program, limits, &state)
        .unwrap()
        .to_json_pretty()
        .unwrap();
    let mut restored = Snapshot::from_json_str(&text).unwrap().restore(None).unwrap();
    Kernel::new(&restored.program, restored.limits.clone()).resume(&mut restored.state);
    restored.state
}

fn uninterrupted(rules: &str, limits: &Limits, seed: &Value) -> RunState {
    let program = Program::parse(rules, limits).unwrap();
    Kernel::new(&program, limits.clone()).run(seed.clone()).unwrap()
}

#[test]
fn test_resume_reproduces_trace_at_every_cut() {
    let limits = Limits::default();
    let seed = int_seq(6);
    let expected = uninterrupted(DROP_HEADS, &limits, &seed);
    assert_eq!(expected.step_counter, 7);

    for k in 0..=expected.trace.len() {
        let resumed = interrupted(DROP_HEADS, &limits, &seed, k);
        assert_eq!(
            serde_json::to_string(&resumed.trace).unwrap(),
            serde_json::to_string(&expected.trace).unwrap(),
            "cut after {} steps",
            k
        );
        assert_eq!(resumed, expected, "cut after {} steps", k);
    }
}

#[test]
fn test_resume_keeps_loop_history() {
    let limits = Limits::default().with_max_steps(10);
    let seed = Value::sym("A");
    let expected = uninterrupted(FLIP, &limits, &seed);
    assert_eq!(expected.halt_reason, Some(HaltReason::LoopDetected));

    let resumed = interrupted(FLIP, &limits, &seed, 1);
    assert_eq!(resumed.trace, expected.trace);
    assert_eq!(resumed.halt_reason, Some(HaltReason::LoopDetected));
}

#[test]
fn test_step_budget_counts_across_resume() {
    let limits = Limits::default().with_max_steps(5).with_cycle_window(0);
    let seed = Value::sym("A");
    let expected = uninterrupted(FLIP, &limits, &seed);
    assert_eq!(expected.halt_reason, Some(HaltReason::MaxSteps));

    let resumed = interrupted(FLIP, &limits, &seed, 3);
    assert_eq!(resumed.step_counter, 5);
    assert_eq!(resumed, expected);
}

#[test]
fn test_snapshot_digest_is_stable_across_serialization() {
    let limits = Limits::default();
    let program = Program::parse(DROP_HEADS, &limits).unwrap();
    let state = Kernel::new(&program, limits.clone())
        .run(int_seq(3))
        .unwrap();
    let snapshot = Snapshot::capture("digest", &program, &limits, &state).unwrap();
    let reread = Snapshot::from_json_str(&snapshot.to_json_pretty().unwrap()).unwrap();
    assert_eq!(
        compute_snapshot_digest(&snapshot).unwrap(),
        compute_snapshot_digest(&reread).unwrap()
    );
}

#[test]
fn test_snapshot_json_uses_structural_values() {
    let limits = Limits::default();
    let program = Program::parse("X -> lobe\n", &limits).unwrap();
    let state = Kernel::new(&program, limits.clone())
        .run(Value::sym("X"))
        .unwrap();
    let snapshot = Snapshot::capture("shape", &program, &limits, &state).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&snapshot.to_json_pretty().unwrap()).unwrap();

    assert_eq!(json["schema"], "rcx.snapshot.v1");
    assert_eq!(json["program"]["rules"][0], "@rule.1 X -> lobe");
    assert_eq!(json["state"]["lobes"], serde_json::json!(["X"]));
    assert_eq!(json["state"]["current"], serde_json::Value::Null);
    assert_eq!(json["state"]["status"], "HALTED");
    assert_eq!(json["state"]["halt_reason"], "completed");
}

const GROW: &str = "[n, ?x] -> rewrite([n, [?x]])\n";

fn grown(steps: usize) -> (Program, Limits, RunState) {
    let limits = Limits::default().with_max_steps(steps).with_cycle_window(0);
    let program = Program::parse(GROW, &limits).unwrap();
    let state = Kernel::new(&program, limits.clone())
        .run(Value::seq([Value::sym("n"), Value::Null]))
        .unwrap();
    (program, limits, state)
}

#[test]
fn test_deep_value_snapshot_reloads() {
    let (program, limits, state) = grown(250);
    assert_eq!(state.halt_reason, Some(HaltReason::MaxSteps));
    assert!(state.current.as_ref().unwrap().depth() > 200);

    let text = Snapshot::capture("deep", &program, &limits, &state)
        .unwrap()
        .to_json_pretty()
        .unwrap();
    let restored = Snapshot::from_json_str(&text).unwrap().restore(None).unwrap();
    assert_eq!(restored.state, state);
}

#[test]
fn test_deep_value_snapshot_resumes_like_uninterrupted_run() {
    let seed = Value::seq([Value::sym("n"), Value::Null]);
    let limits = Limits::default().with_max_steps(220).with_cycle_window(0);
    let expected = uninterrupted(GROW, &limits, &seed);

    let resumed = interrupted(GROW, &limits, &seed, 200);
    assert_eq!(resumed, expected);
}

#[test]
fn test_restore_enforces_depth_limit() {
    let (program, limits, state) = grown(250);
    let snapshot = Snapshot::capture("deep", &program, &limits, &state).unwrap();
    let err = snapshot
        .restore(Some(Limits::default().with_max_depth(100)))
        .unwrap_err();
    assert!(
        matches!(
            err,
            RcxError::BudgetExceeded {
                kind: BudgetKind::Depth,
                limit: 100,
                ..
            }
        ),
        "{:?}",
        err
    );
}

#[test]
fn test_projection_file_program_restores_with_any_id() {
    let limits = Limits::default();
    let program = Program::from_projection_json(
        r#"[
            {"id": "ping pong", "pattern": "PING", "body": "PONG"},
            {"id": "\"pong\" -> done", "pattern": "PONG", "body": "DONE"}
        ]"#,
        &limits,
    )
    .unwrap();
    let kernel = Kernel::new(&program, limits.clone());
    let mut state = kernel.start(Value::sym("PING")).unwrap();
    kernel.step(&mut state).unwrap();

    let snapshot = Snapshot::capture("projections", &program, &limits, &state).unwrap();
    assert_eq!(snapshot.program.rules[0], r#"@"ping pong" PING -> rewrite(PONG)"#);

    let text = snapshot.to_json_pretty().unwrap();
    let mut restored = Snapshot::from_json_str(&text).unwrap().restore(None).unwrap();
    let ids: Vec<&str> = restored.program.rules().iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["ping pong", "\"pong\" -> done"]);
    assert_eq!(restored.program.digest().unwrap(), program.digest().unwrap());

    Kernel::new(&restored.program, restored.limits.clone()).resume(&mut restored.state);
    let expected = kernel.run(Value::sym("PING")).unwrap();
    assert_eq!(restored.state, expected);
}
