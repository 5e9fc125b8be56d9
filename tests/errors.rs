mod common;

use common::runtime_error;
use minipy::interpreter::{parse_program, RuntimeError};

#[test]
fn unknown_names_are_name_errors() {
    assert!(matches!(
        runtime_error("print missing"),
        RuntimeError::NameError { .. }
    ));
    assert!(matches!(
        runtime_error("x = y + 1"),
        RuntimeError::NameError { .. }
    ));
}

#[test]
fn missing_fields_are_name_errors() {
    let source = "\
class C:
  pass

c = C()
print c.missing";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::NameError { .. }
    ));
}

#[test]
fn dotted_access_through_a_non_instance_is_a_type_error() {
    assert!(matches!(
        runtime_error("x = 5\nprint x.y"),
        RuntimeError::TypeError { .. }
    ));

    let source = "\
class C:
  pass

c = C()
c.n = 1
print c.n.deeper";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::TypeError { .. }
    ));
}

#[test]
fn field_assignment_on_a_non_instance_is_a_type_error() {
    assert!(matches!(
        runtime_error("x = 5\nx.y = 1"),
        RuntimeError::TypeError { .. }
    ));
}

#[test]
fn arithmetic_on_mismatched_operands_is_a_type_error() {
    assert!(matches!(
        runtime_error("print \"a\" - \"b\""),
        RuntimeError::TypeError { .. }
    ));
    assert!(matches!(
        runtime_error("print 1 + \"a\""),
        RuntimeError::TypeError { .. }
    ));
    assert!(matches!(
        runtime_error("print \"a\" * 2"),
        RuntimeError::TypeError { .. }
    ));
    assert!(matches!(
        runtime_error("print None + None"),
        RuntimeError::TypeError { .. }
    ));
}

#[test]
fn adding_an_instance_without_dunder_add_is_a_type_error() {
    let source = "\
class C:
  pass

c = C()
print c + 1";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::TypeError { .. }
    ));
}

#[test]
fn division_by_zero_is_its_own_error() {
    assert!(matches!(
        runtime_error("print 7 / 0"),
        RuntimeError::DivisionByZero { .. }
    ));
    assert!(matches!(
        runtime_error("x = 0\nprint 1 / x"),
        RuntimeError::DivisionByZero { .. }
    ));
}

#[test]
fn unknown_methods_and_wrong_arity_are_unbound_method_errors() {
    let source = "\
class C:
  def f(self, n):
    return n

c = C()
c.g()";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::UnboundMethod { .. }
    ));

    let source = "\
class C:
  def f(self, n):
    return n

c = C()
c.f(1, 2)";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::UnboundMethod { .. }
    ));
}

#[test]
fn comparing_incompatible_values_is_a_type_error() {
    assert!(matches!(
        runtime_error("print 1 == \"1\""),
        RuntimeError::TypeError { .. }
    ));
    assert!(matches!(
        runtime_error("print None < None"),
        RuntimeError::TypeError { .. }
    ));
    assert!(matches!(
        runtime_error("print None == 0"),
        RuntimeError::TypeError { .. }
    ));

    let source = "\
class C:
  pass

a = C()
b = C()
print a == b";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::TypeError { .. }
    ));
}

#[test]
fn errors_escape_method_bodies_uncaught() {
    let source = "\
class C:
  def f(self):
    return 1 / 0

c = C()
print c.f()";
    assert!(matches!(
        runtime_error(source),
        RuntimeError::DivisionByZero { .. }
    ));
}

#[test]
fn lexical_and_parse_failures_carry_their_codes() {
    let diagnostic = parse_program("x = \"unterminated").unwrap_err();
    assert_eq!(diagnostic.code.as_deref(), Some("E0101"));

    let diagnostic = parse_program("x = ) 1").unwrap_err();
    assert_eq!(diagnostic.code.as_deref(), Some("E0201"));
}

#[test]
fn runtime_diagnostics_carry_their_codes() {
    assert_eq!(
        runtime_error("print nope").to_diagnostic().code.as_deref(),
        Some("E0301")
    );
    assert_eq!(
        runtime_error("print 1 + \"a\"").to_diagnostic().code.as_deref(),
        Some("E0302")
    );
    assert_eq!(
        runtime_error("print 1 / 0").to_diagnostic().code.as_deref(),
        Some("E0304")
    );
}
