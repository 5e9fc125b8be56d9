use crate::object::Value;

/// Outcome of executing a statement: a plain value, or a `return` unwinding
/// toward the nearest enclosing method body.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    Value(Value),
    Return(Value),
}
