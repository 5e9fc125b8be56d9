pub mod compare;
pub mod control_flow;
pub mod error;
pub mod evaluator;
pub mod parser;

pub use control_flow::ControlFlow;
pub use error::RuntimeError;
pub use evaluator::{parse_and_run, parse_and_run_with_diagnostics, parse_program, run};
pub use parser::{ParseError, Parser};
