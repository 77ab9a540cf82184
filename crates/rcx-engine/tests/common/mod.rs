use rcx_core::Value;
use rcx_engine::commands::run::RunResult;
use rcx_engine::EngineCommandResult;
use rcx_store::FsStore;
use tempfile::TempDir;

pub const PINGPONG: &str = "PING -> rewrite(PONG)\nPONG -> ra\n";
pub const NEEDS_Y: &str = "@need [f, ?x] -> rewrite([g, ?y])\n";
pub const PASS_X: &str = "@pass [f, ?x] -> rewrite([g, ?x])\n[g, _] -> ra\n";

#[allow(dead_code)]
pub fn setup_store() -> (FsStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp store directory");
    (FsStore::new(dir.path().join("cas")), dir)
}

#[allow(dead_code)]
pub fn f_of(n: i64) -> Value {
    Value::seq([Value::sym("f"), Value::int(n)])
}

#[allow(dead_code)]
pub fn expect_run(result: EngineCommandResult) -> RunResult {
    match result {
        EngineCommandResult::Run(r) | EngineCommandResult::Resume(r) => *r,
        other => panic!("expected a run result, got {:?}", other),
    }
}
