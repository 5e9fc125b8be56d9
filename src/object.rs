use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::interpreter::control_flow::ControlFlow;
use crate::interpreter::error::RuntimeError;
use crate::interpreter::evaluator;

pub const SELF_NAME: &str = "self";
pub const INIT_METHOD: &str = "__init__";
pub const STR_METHOD: &str = "__str__";
pub const ADD_METHOD: &str = "__add__";
pub const EQ_METHOD: &str = "__eq__";
pub const LT_METHOD: &str = "__lt__";

/// Name → value mapping used as an execution scope: the global scope, and
/// the per-call scope of a method body. Insertion order carries no meaning.
pub type Closure = HashMap<String, Value>;

/// Execution environment. The only resource it exposes is the sink that
/// `print` writes to.
pub trait Context {
    fn output(&mut self) -> &mut dyn Write;
}

/// Context over an arbitrary sink, normally stdout.
pub struct SimpleContext<W: Write> {
    out: W,
}

impl<W: Write> SimpleContext<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Context for SimpleContext<W> {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }
}

/// Context that captures output in memory.
#[derive(Default)]
pub struct BufferContext {
    out: Vec<u8>,
}

impl BufferContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl Context for BufferContext {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }
}

/// A runtime value behind a shared handle. Cloning shares the underlying
/// object for classes and instances (`Rc`), so a value can be bound in
/// several closures at once; `self` in a method body is exactly such a
/// shared handle to the receiver. `Value::None` doubles as the empty
/// reference.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Number(i64),
    Str(Rc<str>),
    Bool(bool),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(text.as_ref()))
    }

    pub fn as_number(&self) -> Option<i64> {
        if let Value::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(s) = self {
            Some(s.as_ref())
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn as_class(&self) -> Option<&Rc<Class>> {
        if let Value::Class(class) = self {
            Some(class)
        } else {
            None
        }
    }

    pub fn as_instance(&self) -> Option<&Rc<RefCell<Instance>>> {
        if let Value::Instance(instance) = self {
            Some(instance)
        } else {
            None
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Non-zero numbers, non-empty strings and `True` are truthy; everything
    /// else, classes and instances included, is falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            _ => false,
        }
    }

    /// Human-readable print form. Instances render through their `__str__`
    /// when the class chain provides a zero-argument one, otherwise by
    /// identity.
    pub fn display(&self, ctx: &mut dyn Context) -> Result<String, RuntimeError> {
        match self {
            Value::None => Ok("None".to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Str(s) => Ok(s.to_string()),
            Value::Bool(true) => Ok("True".to_string()),
            Value::Bool(false) => Ok("False".to_string()),
            Value::Class(class) => Ok(format!("Class {}", class.name())),
            Value::Instance(instance) => {
                let has_str = instance.borrow().has_method(STR_METHOD, 0);
                if has_str {
                    let rendered = Instance::call(instance, STR_METHOD, Vec::new(), ctx)?;
                    rendered.display(ctx)
                } else {
                    let name = instance.borrow().class().name().to_string();
                    Ok(format!("<{} object at {:p}>", name, Rc::as_ptr(instance)))
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct Method {
    pub name: String,
    /// Formal parameters excluding the implicit `self`.
    pub formal_params: Vec<String>,
    pub body: Stmt,
}

/// A user-defined class: a method table plus an optional base class.
/// Classes are immutable once defined.
#[derive(Debug)]
pub struct Class {
    name: String,
    methods: Vec<Method>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: impl Into<String>, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        Self {
            name: name.into(),
            methods,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    /// Own methods first, in declaration order, then the parent chain. The
    /// first match by name wins regardless of arity.
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.method(name)))
    }
}

#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    fields: IndexMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<RefCell<Instance>> {
        Rc::new(RefCell::new(Instance {
            class,
            fields: IndexMap::new(),
        }))
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// Fields come into existence on first assignment.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn has_method(&self, name: &str, argument_count: usize) -> bool {
        self.class
            .method(name)
            .is_some_and(|m| m.formal_params.len() == argument_count)
    }

    /// Dynamic dispatch: resolve the method along the class chain, check
    /// arity, bind formals and `self` into a fresh closure and run the body.
    /// A `return` inside the body becomes the call result; a body that falls
    /// off the end yields `None`.
    pub fn call(
        this: &Rc<RefCell<Instance>>,
        name: &str,
        args: Vec<Value>,
        ctx: &mut dyn Context,
    ) -> Result<Value, RuntimeError> {
        let class = Rc::clone(this.borrow().class());
        let method = match class.method(name) {
            Some(m) if m.formal_params.len() == args.len() => m,
            _ => return Err(RuntimeError::unbound_method(name, class.name())),
        };

        let mut closure: Closure = method.formal_params.iter().cloned().zip(args).collect();
        closure.insert(SELF_NAME.to_string(), Value::Instance(Rc::clone(this)));
        match evaluator::execute(&method.body, &mut closure, ctx)? {
            ControlFlow::Return(value) | ControlFlow::Value(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Rc<Class> {
        Rc::new(Class::new(name, methods, parent))
    }

    fn method(name: &str, params: &[&str]) -> Method {
        Method {
            name: name.to_string(),
            formal_params: params.iter().map(|p| p.to_string()).collect(),
            body: Stmt::Compound(Vec::new()),
        }
    }

    #[test]
    fn truthiness() {
        assert!(Value::Number(1).is_truthy());
        assert!(Value::Number(-3).is_truthy());
        assert!(!Value::Number(0).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::None.is_truthy());

        let base = class("A", Vec::new(), None);
        assert!(!Value::Class(Rc::clone(&base)).is_truthy());
        assert!(!Value::Instance(Instance::new(base)).is_truthy());
    }

    #[test]
    fn display_of_scalars() {
        let mut ctx = BufferContext::new();
        assert_eq!(Value::Number(-7).display(&mut ctx).unwrap(), "-7");
        assert_eq!(Value::str("hi").display(&mut ctx).unwrap(), "hi");
        assert_eq!(Value::Bool(true).display(&mut ctx).unwrap(), "True");
        assert_eq!(Value::Bool(false).display(&mut ctx).unwrap(), "False");
        assert_eq!(Value::None.display(&mut ctx).unwrap(), "None");
    }

    #[test]
    fn display_of_class_and_plain_instance() {
        let mut ctx = BufferContext::new();
        let base = class("Point", Vec::new(), None);
        assert_eq!(
            Value::Class(Rc::clone(&base)).display(&mut ctx).unwrap(),
            "Class Point"
        );

        let rendered = Value::Instance(Instance::new(base))
            .display(&mut ctx)
            .unwrap();
        assert!(rendered.starts_with("<Point object at 0x"));
    }

    #[test]
    fn method_resolution_prefers_own_declaration_order() {
        let parent = class("A", vec![method("f", &["x"]), method("g", &[])], None);
        let child = class("B", vec![method("f", &[])], Some(Rc::clone(&parent)));

        // Shadowing wins regardless of arity.
        assert_eq!(child.method("f").unwrap().formal_params.len(), 0);
        // Unshadowed methods come from the parent.
        assert!(child.method("g").is_some());
        assert!(child.method("h").is_none());
    }

    #[test]
    fn has_method_checks_arity() {
        let base = class("A", vec![method("f", &["x", "y"])], None);
        let instance = Instance::new(base);
        assert!(instance.borrow().has_method("f", 2));
        assert!(!instance.borrow().has_method("f", 1));
        assert!(!instance.borrow().has_method("g", 0));
    }

    #[test]
    fn value_equality_is_identity_for_instances() {
        let base = class("A", Vec::new(), None);
        let a = Instance::new(Rc::clone(&base));
        let b = Instance::new(base);
        assert_eq!(Value::Instance(Rc::clone(&a)), Value::Instance(a.clone()));
        assert_ne!(Value::Instance(a), Value::Instance(b));
        assert_eq!(Value::Number(2), Value::Number(2));
        assert_ne!(Value::Number(2), Value::Bool(true));
    }

    #[test]
    fn fields_appear_on_first_assignment() {
        let base = class("A", Vec::new(), None);
        let instance = Instance::new(base);
        assert!(instance.borrow().field("x").is_none());
        instance.borrow_mut().set_field("x", Value::Number(5));
        assert_eq!(instance.borrow().field("x"), Some(&Value::Number(5)));
    }
}
