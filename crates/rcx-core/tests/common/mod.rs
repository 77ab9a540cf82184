use rcx_core::{Kernel, Limits, Program, RunState, StepPhase, Value};

/// Parse rule text with default limits
#[allow(dead_code)]
pub fn program(text: &str) -> Program {
    Program::parse(text, &Limits::default()).expect("rules should parse")
}

/// Run a program from a seed term written in rule syntax
#[allow(dead_code)]
pub fn run_term(rules: &str, seed: &str, limits: Limits) -> RunState {
    let program = Program::parse(rules, &limits).expect("rules should parse");
    let seed = rcx_core::program::parse_term(seed).expect("seed should parse");
    Kernel::new(&program, limits).run(seed).expect("seed should be accepted")
}

/// Phases of every recorded step
#[allow(dead_code)]
pub fn phases(state: &RunState) -> Vec<StepPhase> {
    state.trace.iter().map(|event| event.phase).collect()
}

/// `[0, 1, ..., n-1]`
#[allow(dead_code)]
pub fn int_seq(n: usize) -> Value {
    Value::Seq((0..n as i64).map(Value::int).collect())
}

/// `n` levels of singleton sequences around `leaf`
#[allow(dead_code)]
pub fn nested(n: usize, leaf: Value) -> Value {
    let mut value = leaf;
    for _ in 0..n {
        value = Value::Seq(vec![value]);
    }
    value
}
