use rcx_core::snapshot::Snapshot;
use rcx_core::trace::WorldTrace;
use rcx_core::{Kernel, Limits, Program, Value};
use rcx_store::FsStore;
use tempfile::TempDir;

pub fn setup_store() -> (FsStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp CAS directory");
    (FsStore::new(dir.path()), dir)
}

/// Run `rules` from `seed` and return the world trace and snapshot.
#[allow(dead_code)]
pub fn run(world: &str, rules: &str, seed: Value) -> (WorldTrace, Snapshot) {
    let limits = Limits::default();
    let program = Program::parse(rules, &limits).unwrap();
    let state = Kernel::new(&program, limits.clone())
        .run(seed.clone())
        .unwrap();
    let trace = WorldTrace::from_run(world, seed, &limits, &state);
    let snapshot = Snapshot::capture(world, &program, &limits, &state).unwrap();
    (trace, snapshot)
}

/// Every file under the store root, recursively.
#[allow(dead_code)]
pub fn stored_files(store: &FsStore) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![store.root().to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
