//! The six comparison relations. `equal` and `less` are primitive and may
//! dispatch to user-defined `__eq__`/`__lt__`; the other four derive from
//! them.

use std::rc::Rc;

use crate::object::{Context, Instance, Value, EQ_METHOD, LT_METHOD};

use super::error::RuntimeError;

pub fn equal(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    if lhs.is_none() && rhs.is_none() {
        return Ok(true);
    }
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        _ => {
            if let Some(instance) = lhs.as_instance() {
                if instance.borrow().has_method(EQ_METHOD, 1) {
                    let instance = Rc::clone(instance);
                    let result = Instance::call(&instance, EQ_METHOD, vec![rhs.clone()], ctx)?;
                    return Ok(result.is_truthy());
                }
            }
            Err(RuntimeError::type_error(
                "these values cannot be compared for equality",
            ))
        }
    }
}

pub fn less(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a < b),
        (Value::Str(a), Value::Str(b)) => Ok(a < b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a < b),
        _ => {
            if let Some(instance) = lhs.as_instance() {
                if instance.borrow().has_method(LT_METHOD, 1) {
                    let instance = Rc::clone(instance);
                    let result = Instance::call(&instance, LT_METHOD, vec![rhs.clone()], ctx)?;
                    return Ok(result.is_truthy());
                }
            }
            Err(RuntimeError::type_error(
                "these values cannot be ordered",
            ))
        }
    }
}

pub fn not_equal(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, ctx)?)
}

pub fn less_or_equal(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(less(lhs, rhs, ctx)? || equal(lhs, rhs, ctx)?)
}

pub fn greater(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(!less_or_equal(lhs, rhs, ctx)?)
}

pub fn greater_or_equal(lhs: &Value, rhs: &Value, ctx: &mut dyn Context) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BufferContext;

    fn ctx() -> BufferContext {
        BufferContext::new()
    }

    #[test]
    fn scalar_equality() {
        let mut ctx = ctx();
        assert!(equal(&Value::Number(3), &Value::Number(3), &mut ctx).unwrap());
        assert!(!equal(&Value::Number(3), &Value::Number(4), &mut ctx).unwrap());
        assert!(equal(&Value::str("ab"), &Value::str("ab"), &mut ctx).unwrap());
        assert!(equal(&Value::Bool(true), &Value::Bool(true), &mut ctx).unwrap());
    }

    #[test]
    fn two_nones_are_equal_but_not_ordered() {
        let mut ctx = ctx();
        assert!(equal(&Value::None, &Value::None, &mut ctx).unwrap());
        assert!(less(&Value::None, &Value::None, &mut ctx).is_err());
    }

    #[test]
    fn mixed_variants_do_not_compare() {
        let mut ctx = ctx();
        assert!(equal(&Value::Number(1), &Value::str("1"), &mut ctx).is_err());
        assert!(equal(&Value::Number(0), &Value::None, &mut ctx).is_err());
        assert!(less(&Value::Bool(true), &Value::Number(2), &mut ctx).is_err());
    }

    #[test]
    fn ordering_of_numbers_and_strings() {
        let mut ctx = ctx();
        assert!(less(&Value::Number(-1), &Value::Number(2), &mut ctx).unwrap());
        assert!(less(&Value::str("abc"), &Value::str("abd"), &mut ctx).unwrap());
        assert!(!less(&Value::str("b"), &Value::str("ab"), &mut ctx).unwrap());
        assert!(less(&Value::Bool(false), &Value::Bool(true), &mut ctx).unwrap());
    }

    #[test]
    fn derived_relations_agree_with_primitives() {
        let mut ctx = ctx();
        let two = Value::Number(2);
        let three = Value::Number(3);

        assert!(not_equal(&two, &three, &mut ctx).unwrap());
        assert!(less_or_equal(&two, &two, &mut ctx).unwrap());
        assert!(less_or_equal(&two, &three, &mut ctx).unwrap());
        assert!(greater(&three, &two, &mut ctx).unwrap());
        assert!(!greater(&two, &two, &mut ctx).unwrap());
        assert!(greater_or_equal(&two, &two, &mut ctx).unwrap());
        assert!(!greater_or_equal(&two, &three, &mut ctx).unwrap());
    }

    #[test]
    fn less_or_equal_is_total_for_numbers_and_strings() {
        let mut ctx = ctx();
        for (a, b) in [(1, 2), (2, 1), (5, 5)] {
            let a = Value::Number(a);
            let b = Value::Number(b);
            assert!(
                less_or_equal(&a, &b, &mut ctx).unwrap()
                    || less_or_equal(&b, &a, &mut ctx).unwrap()
            );
        }
        for (a, b) in [("x", "y"), ("y", "x"), ("", "")] {
            let a = Value::str(a);
            let b = Value::str(b);
            assert!(
                less_or_equal(&a, &b, &mut ctx).unwrap()
                    || less_or_equal(&b, &a, &mut ctx).unwrap()
            );
        }
    }
}
