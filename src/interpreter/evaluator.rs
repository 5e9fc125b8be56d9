use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt};
use crate::diagnostic::Diagnostic;
use crate::lexer::Lexer;
use crate::object::{Closure, Context, Instance, Value, ADD_METHOD, INIT_METHOD};

use super::compare;
use super::control_flow::ControlFlow;
use super::error::RuntimeError;
use super::parser::Parser;

/// Execute a statement under a closure and a context. Only
/// `ControlFlow::Return` travels upward out of here; every error propagates
/// to the caller untouched.
pub fn execute(
    stmt: &Stmt,
    closure: &mut Closure,
    ctx: &mut dyn Context,
) -> Result<ControlFlow, RuntimeError> {
    match stmt {
        Stmt::Expr(expr) => Ok(ControlFlow::Value(evaluate(expr, closure, ctx)?)),

        Stmt::Assignment { name, value } => {
            let value = evaluate(value, closure, ctx)?;
            closure.insert(name.clone(), value.clone());
            Ok(ControlFlow::Value(value))
        }

        Stmt::FieldAssignment {
            object,
            field,
            value,
        } => {
            let target = evaluate(object, closure, ctx)?;
            let Some(instance) = target.as_instance() else {
                return Err(RuntimeError::type_error(
                    "fields can only be assigned on class instances",
                )
                .at(object.span));
            };
            let instance = Rc::clone(instance);
            let value = evaluate(value, closure, ctx)?;
            instance.borrow_mut().set_field(field.clone(), value.clone());
            Ok(ControlFlow::Value(value))
        }

        Stmt::Print(args) => {
            for (i, arg) in args.iter().enumerate() {
                let value = evaluate(arg, closure, ctx)?;
                let text = value.display(ctx)?;
                if i > 0 {
                    let _ = write!(ctx.output(), " ");
                }
                let _ = write!(ctx.output(), "{}", text);
            }
            let _ = writeln!(ctx.output());
            Ok(ControlFlow::Value(Value::None))
        }

        Stmt::If {
            condition,
            then_body,
            else_body,
        } => {
            if evaluate(condition, closure, ctx)?.is_truthy() {
                execute(then_body, closure, ctx)
            } else if let Some(else_body) = else_body {
                execute(else_body, closure, ctx)
            } else {
                Ok(ControlFlow::Value(Value::None))
            }
        }

        Stmt::Return(expr) => Ok(ControlFlow::Return(evaluate(expr, closure, ctx)?)),

        Stmt::Compound(stmts) => {
            for stmt in stmts {
                if let ControlFlow::Return(value) = execute(stmt, closure, ctx)? {
                    return Ok(ControlFlow::Return(value));
                }
            }
            Ok(ControlFlow::Value(Value::None))
        }

        Stmt::MethodBody(body) => match execute(body, closure, ctx)? {
            ControlFlow::Return(value) => Ok(ControlFlow::Value(value)),
            ControlFlow::Value(_) => Ok(ControlFlow::Value(Value::None)),
        },

        Stmt::ClassDefinition(class) => {
            let value = Value::Class(Rc::clone(class));
            closure.insert(class.name().to_string(), value.clone());
            Ok(ControlFlow::Value(value))
        }
    }
}

pub fn evaluate(
    expr: &Expr,
    closure: &mut Closure,
    ctx: &mut dyn Context,
) -> Result<Value, RuntimeError> {
    match &expr.kind {
        ExprKind::Literal(value) => Ok(value.clone()),

        ExprKind::Variable(path) => resolve_variable(path, closure).map_err(|e| e.at(expr.span)),

        ExprKind::Binary { left, op, right } => {
            eval_binary(*op, left, right, closure, ctx).map_err(|e| e.at(expr.span))
        }

        ExprKind::Not(arg) => Ok(Value::Bool(!evaluate(arg, closure, ctx)?.is_truthy())),

        ExprKind::Stringify(arg) => {
            let value = evaluate(arg, closure, ctx)?;
            Ok(Value::str(value.display(ctx)?))
        }

        ExprKind::MethodCall {
            object,
            method,
            args,
        } => {
            let receiver = evaluate(object, closure, ctx)?;
            let Some(instance) = receiver.as_instance() else {
                // A call on a non-instance quietly yields None; the
                // arguments are not evaluated.
                return Ok(Value::None);
            };
            let instance = Rc::clone(instance);
            let mut actuals = Vec::with_capacity(args.len());
            for arg in args {
                actuals.push(evaluate(arg, closure, ctx)?);
            }
            Instance::call(&instance, method, actuals, ctx).map_err(|e| e.at(expr.span))
        }

        ExprKind::NewInstance { class, args } => {
            let instance = Instance::new(Rc::clone(class));
            let has_init = instance.borrow().has_method(INIT_METHOD, args.len());
            if has_init {
                let mut actuals = Vec::with_capacity(args.len());
                for arg in args {
                    actuals.push(evaluate(arg, closure, ctx)?);
                }
                // The constructor works through its side effects on `self`;
                // its result is discarded.
                Instance::call(&instance, INIT_METHOD, actuals, ctx).map_err(|e| e.at(expr.span))?;
            }
            Ok(Value::Instance(instance))
        }
    }
}

fn resolve_variable(path: &[String], closure: &Closure) -> Result<Value, RuntimeError> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(Value::None);
    };
    let mut value = closure
        .get(head)
        .cloned()
        .ok_or_else(|| RuntimeError::name_error(head.clone()))?;

    let mut owner = head;
    for segment in rest {
        let Some(instance) = value.as_instance() else {
            return Err(RuntimeError::type_error(format!(
                "`{}` is not a class instance",
                owner
            )));
        };
        let field = instance.borrow().field(segment).cloned();
        value = field.ok_or_else(|| RuntimeError::name_error(segment.clone()))?;
        owner = segment;
    }
    Ok(value)
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    closure: &mut Closure,
    ctx: &mut dyn Context,
) -> Result<Value, RuntimeError> {
    match op {
        // Short-circuit forms decide on the left operand alone where they
        // can, and always produce a fresh Bool.
        BinaryOp::And => {
            if !evaluate(left, closure, ctx)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(evaluate(right, closure, ctx)?.is_truthy()))
        }
        BinaryOp::Or => {
            if evaluate(left, closure, ctx)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(evaluate(right, closure, ctx)?.is_truthy()))
        }

        BinaryOp::Add => {
            let lhs = evaluate(left, closure, ctx)?;
            let rhs = evaluate(right, closure, ctx)?;
            match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.wrapping_add(*b))),
                (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
                _ => {
                    if let Some(instance) = lhs.as_instance() {
                        if instance.borrow().has_method(ADD_METHOD, 1) {
                            let instance = Rc::clone(instance);
                            return Instance::call(&instance, ADD_METHOD, vec![rhs], ctx);
                        }
                    }
                    Err(RuntimeError::type_error(
                        "operator `+` is not defined for these operands",
                    ))
                }
            }
        }

        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let lhs = evaluate(left, closure, ctx)?;
            let rhs = evaluate(right, closure, ctx)?;
            arithmetic(op, &lhs, &rhs)
        }

        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Less
        | BinaryOp::LessOrEq
        | BinaryOp::Greater
        | BinaryOp::GreaterOrEq => {
            let lhs = evaluate(left, closure, ctx)?;
            let rhs = evaluate(right, closure, ctx)?;
            let result = match op {
                BinaryOp::Eq => compare::equal(&lhs, &rhs, ctx)?,
                BinaryOp::NotEq => compare::not_equal(&lhs, &rhs, ctx)?,
                BinaryOp::Less => compare::less(&lhs, &rhs, ctx)?,
                BinaryOp::LessOrEq => compare::less_or_equal(&lhs, &rhs, ctx)?,
                BinaryOp::Greater => compare::greater(&lhs, &rhs, ctx)?,
                _ => compare::greater_or_equal(&lhs, &rhs, ctx)?,
            };
            Ok(Value::Bool(result))
        }
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(RuntimeError::type_error(format!(
            "operator `{}` is only defined for numbers",
            op.symbol()
        )));
    };
    match op {
        BinaryOp::Sub => Ok(Value::Number(a.wrapping_sub(b))),
        BinaryOp::Mul => Ok(Value::Number(a.wrapping_mul(b))),
        BinaryOp::Div if b == 0 => Err(RuntimeError::division_by_zero()),
        BinaryOp::Div => Ok(Value::Number(a.wrapping_div(b))),
        _ => Err(RuntimeError::type_error(format!(
            "operator `{}` is not an arithmetic operator",
            op.symbol()
        ))),
    }
}

/// Run a parsed program against a fresh global scope. A `return` reaching
/// the top level simply ends the program.
pub fn run(program: &Stmt, ctx: &mut dyn Context) -> Result<(), RuntimeError> {
    let mut globals = Closure::new();
    execute(program, &mut globals, ctx)?;
    Ok(())
}

/// Lex and parse a source text into its root statement.
pub fn parse_program(source: &str) -> Result<Stmt, Diagnostic> {
    let lexer = Lexer::new(source).map_err(|e| e.to_diagnostic())?;
    Parser::new(lexer).parse().map_err(|e| e.to_diagnostic())
}

pub fn parse_and_run(source: &str, ctx: &mut dyn Context) -> Result<(), String> {
    let program = parse_program(source).map_err(|d| d.message)?;
    run(&program, ctx).map_err(|e| format!("Runtime error: {}", e))
}

pub fn parse_and_run_with_diagnostics(
    source: &str,
    ctx: &mut dyn Context,
) -> Result<(), Vec<Diagnostic>> {
    let program = parse_program(source).map_err(|d| vec![d])?;
    run(&program, ctx).map_err(|e| vec![e.to_diagnostic()])
}
