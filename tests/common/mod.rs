use minipy::interpreter::{parse_and_run, parse_program, run, RuntimeError};
use minipy::object::BufferContext;

/// Run a program and hand back everything it printed.
#[allow(dead_code)]
pub fn run_source(source: &str) -> String {
    let mut ctx = BufferContext::new();
    parse_and_run(source, &mut ctx).expect("program should run");
    ctx.text()
}

/// Run a program that is expected to fail at runtime and hand back the error.
#[allow(dead_code)]
pub fn runtime_error(source: &str) -> RuntimeError {
    let program = parse_program(source).expect("program should parse");
    let mut ctx = BufferContext::new();
    run(&program, &mut ctx).expect_err("program should fail at runtime")
}
