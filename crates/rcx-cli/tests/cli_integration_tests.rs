#![allow(clippy::unwrap_used, clippy::expect_used)]
//! CLI integration tests
//!
//! These tests run the built `rcx` binary against files in a scratch
//! directory and check stdout, written files and exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn rcx(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rcx"))
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_run_null_pair_routes_to_ra() {
    let dir = TempDir::new().unwrap();
    write(&dir, "nullpair.rules", "[null, _] -> ra\n");

    let output = rcx(
        dir.path(),
        &["run", "--rules", "nullpair.rules", "--seed", "[null, \"a\"]"],
    );
    let trace = stdout_json(&output);

    assert_eq!(trace["schema"], "rcx-world-trace.v1");
    assert_eq!(trace["world"], "nullpair");
    assert_eq!(trace["halt_reason"], "completed");
    assert_eq!(trace["bucket"], "ra");
    assert_eq!(trace["steps"], 1);
}

#[test]
fn test_run_loop_detected() {
    let dir = TempDir::new().unwrap();
    write(&dir, "ab.rules", "A -> rewrite(B)\nB -> rewrite(A)\n");

    let output = rcx(
        dir.path(),
        &["run", "--rules", "ab.rules", "--seed", "A", "--max-steps", "10"],
    );
    let trace = stdout_json(&output);

    assert_eq!(trace["halt_reason"], "loop_detected");
    assert_eq!(trace["max_steps"], 10);
    assert_eq!(trace["bucket"], "ra");
}

#[test]
fn test_run_max_steps_without_cycle_window() {
    let dir = TempDir::new().unwrap();
    write(&dir, "ab.rules", "A -> rewrite(B)\nB -> rewrite(A)\n");

    let output = rcx(
        dir.path(),
        &[
            "run", "--rules", "ab.rules", "--seed", "A", "--max-steps", "10",
            "--cycle-window", "0",
        ],
    );
    let trace = stdout_json(&output);

    assert_eq!(trace["halt_reason"], "max_steps");
    assert_eq!(trace["steps"], 10);
}

#[test]
fn test_run_with_limits_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "p.rules", "PING -> rewrite(PONG)\nPONG -> ra\n");
    write(&dir, "limits.json", r#"{"max_steps": 1}"#);

    let output = rcx(
        dir.path(),
        &["run", "--rules", "p.rules", "--seed", "PING", "--limits", "limits.json"],
    );
    let trace = stdout_json(&output);

    assert_eq!(trace["halt_reason"], "max_steps");
    assert_eq!(trace["steps"], 1);
}

#[test]
fn test_run_from_projections() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pp.json",
        r#"[{"id": "ping", "pattern": "PING", "body": "PONG"}]"#,
    );

    let output = rcx(
        dir.path(),
        &["run", "--projections", "pp.json", "--seed", "PING", "--world", "pp"],
    );
    let trace = stdout_json(&output);

    assert_eq!(trace["world"], "pp");
    assert_eq!(trace["final"], "PONG");
    assert_eq!(trace["trace"][0]["projection_id"], "ping");
}

#[test]
fn test_run_requires_program() {
    let dir = TempDir::new().unwrap();
    let output = rcx(dir.path(), &["run", "--seed", "A"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--rules"));
}

#[test]
fn test_stall_snapshot_resume_and_show() {
    // Given: A run that stalls on an unbound variable, saved to a snapshot
    let dir = TempDir::new().unwrap();
    write(&dir, "need.rules", "@need [f, ?x] -> rewrite([g, ?y])\n");
    write(&dir, "pass.rules", "@pass [f, ?x] -> rewrite([g, ?x])\n[g, _] -> ra\n");

    let output = rcx(
        dir.path(),
        &[
            "run", "--rules", "need.rules", "--seed", "[f, 1]", "--snapshot-out", "s.json",
        ],
    );
    let stalled = stdout_json(&output);
    assert_eq!(stalled["status"], "STALLED");
    assert!(stalled.get("halt_reason").is_none());

    // When: The snapshot is shown
    let show = rcx(dir.path(), &["snapshot", "show", "s.json"]);
    assert!(show.status.success());
    let text = String::from_utf8_lossy(&show.stdout);
    assert!(text.contains("status: STALLED"));
    assert!(text.contains("step_counter: 1"));
    assert!(text.contains("current: [f, 1]"));
    assert!(!text.contains("route:"));

    // And: It is resumed under a program that fixes it
    let output = rcx(
        dir.path(),
        &[
            "resume", "--snapshot", "s.json", "--rules", "pass.rules", "--exec-out",
            "exec.jsonl",
        ],
    );
    let resumed = stdout_json(&output);

    // Then: The run completes and its execution events replay cleanly
    assert_eq!(resumed["halt_reason"], "completed");
    assert_eq!(resumed["steps"], 3);

    let replay = rcx(
        dir.path(),
        &["replay", "--trace", "exec.jsonl", "--check-canon", "--print-exec-summary"],
    );
    let summary = stdout_json(&replay);
    assert_eq!(summary["counts"]["stall"], 1);
    assert_eq!(summary["counts"]["fix"], 1);
    assert_eq!(summary["counts"]["fixed"], 1);
    assert_eq!(summary["final_status"], "ACTIVE");
}

#[test]
fn test_replay_roundtrip_and_expect() {
    let dir = TempDir::new().unwrap();
    write(&dir, "p.rules", "PING -> rewrite(PONG)\nPONG -> ra\n");

    let output = rcx(
        dir.path(),
        &["run", "--rules", "p.rules", "--seed", "PING", "--trace-out", "world.json"],
    );
    assert!(output.status.success());

    // Canonicalize the world trace to JSONL
    let replay = rcx(
        dir.path(),
        &["replay", "--trace", "world.json", "--out", "canon.jsonl"],
    );
    assert!(replay.status.success());
    let canon = fs::read_to_string(dir.path().join("canon.jsonl")).unwrap();
    assert_eq!(canon.lines().count(), 2);

    // Canonical output is already canonical, and matches its source
    let again = rcx(
        dir.path(),
        &[
            "replay", "--trace", "canon.jsonl", "--check-canon", "--expect", "world.json",
        ],
    );
    assert!(
        again.status.success(),
        "Stderr: {}",
        String::from_utf8_lossy(&again.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&again.stdout), canon);

    // Re-executing the program reproduces the recorded trace
    let verify = rcx(
        dir.path(),
        &["replay", "--trace", "world.json", "--rules", "p.rules", "--out", "v.jsonl"],
    );
    assert!(verify.status.success());
}

#[test]
fn test_replay_exit_codes() {
    let dir = TempDir::new().unwrap();
    write(&dir, "gap.jsonl", "{\"type\":\"a\",\"i\":0}\n{\"type\":\"b\",\"i\":2}\n");
    write(&dir, "a.jsonl", "{\"type\":\"a\",\"i\":0}\n");
    write(&dir, "b.jsonl", "{\"type\":\"b\",\"i\":0}\n");
    write(&dir, "bad.jsonl", "not json\n");

    let missing = rcx(dir.path(), &["replay", "--trace", "nope.jsonl"]);
    assert_eq!(missing.status.code(), Some(2));

    let gap = rcx(dir.path(), &["replay", "--trace", "gap.jsonl"]);
    assert_eq!(gap.status.code(), Some(2));

    let bad = rcx(dir.path(), &["replay", "--trace", "bad.jsonl"]);
    assert_eq!(bad.status.code(), Some(2));

    let not_canon = rcx(dir.path(), &["replay", "--trace", "a.jsonl", "--check-canon"]);
    assert_eq!(not_canon.status.code(), Some(2));

    let mismatch = rcx(
        dir.path(),
        &["replay", "--trace", "a.jsonl", "--expect", "b.jsonl"],
    );
    assert_eq!(mismatch.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&mismatch.stderr).contains("ERR_REPLAY_MISMATCH"));
}

#[test]
fn test_replay_divergent_program_exits_one() {
    let dir = TempDir::new().unwrap();
    write(&dir, "p.rules", "PING -> rewrite(PONG)\nPONG -> ra\n");
    write(&dir, "q.rules", "PING -> rewrite(PONG)\nPONG -> sink\n");

    let output = rcx(
        dir.path(),
        &["run", "--rules", "p.rules", "--seed", "PING", "--trace-out", "world.json"],
    );
    assert!(output.status.success());

    let verify = rcx(
        dir.path(),
        &["replay", "--trace", "world.json", "--rules", "q.rules"],
    );
    assert_eq!(verify.status.code(), Some(1));
}

#[test]
fn test_run_with_store() {
    let dir = TempDir::new().unwrap();
    write(&dir, "p.rules", "PING -> rewrite(PONG)\nPONG -> ra\n");

    let output = rcx(
        dir.path(),
        &["run", "--rules", "p.rules", "--seed", "PING", "--store", "cas"],
    );
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("stored world_trace"));
    assert!(stderr.contains("stored snapshot"));
    assert!(dir.path().join("cas").is_dir());
}
