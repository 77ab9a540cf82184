#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{phases, run_term};
use rcx_core::{Bucket, HaltReason, Limits, RunStatus, StepPhase, Value};

#[test]
fn test_null_pair_routes_to_ra() {
    let state = run_term("[null, _] -> ra\n", r#"[null, "a"]"#, Limits::default());

    assert_eq!(state.status, RunStatus::Halted);
    assert_eq!(state.halt_reason, Some(HaltReason::Completed));
    assert_eq!(state.bucket(), Some(Bucket::Ra));
    assert_eq!(phases(&state), vec![StepPhase::Closure]);
    assert_eq!(
        state.buckets.ra,
        vec![Value::seq([Value::Null, Value::sym("a")])]
    );
    assert_eq!(state.current, None);
}

#[test]
fn test_classifier_rule_beats_structural_default() {
    // All-distinct children would default to sink.
    let state = run_term("[null, _] -> lobe\n", "[null, a]", Limits::default());
    assert_eq!(state.bucket(), Some(Bucket::Lobe));

    let state = run_term("[x, _] -> lobe\n", "[null, a]", Limits::default());
    assert_eq!(state.bucket(), Some(Bucket::Sink));
}

#[test]
fn test_wildcard_matches_any_single_value() {
    for seed in ["[null, 1]", "[null, [1, 2]]", r#"[null, {"k": true}]"#, "[null, null]"] {
        let state = run_term("[null, _] -> ra\n", seed, Limits::default());
        assert_eq!(state.bucket(), Some(Bucket::Ra), "seed {}", seed);
    }

    let state = run_term("[null, _] -> null_reg\n", "[null, a, b]", Limits::default());
    assert_ne!(state.bucket(), Some(Bucket::NullReg));
}
