use std::error::Error;
use std::fmt;

use crate::diagnostic::{Diagnostic, Label, Span};

#[derive(Debug, Clone)]
pub enum RuntimeError {
    NameError { name: String, span: Span },
    TypeError { message: String, span: Span },
    UnboundMethod { method: String, class: String, span: Span },
    DivisionByZero { span: Span },
}

impl RuntimeError {
    pub fn name_error(name: impl Into<String>) -> Self {
        Self::NameError {
            name: name.into(),
            span: Span::dummy(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
            span: Span::dummy(),
        }
    }

    pub fn unbound_method(method: impl Into<String>, class: impl Into<String>) -> Self {
        Self::UnboundMethod {
            method: method.into(),
            class: class.into(),
            span: Span::dummy(),
        }
    }

    pub fn division_by_zero() -> Self {
        Self::DivisionByZero { span: Span::dummy() }
    }

    /// Attach a source location unless one was already recorded.
    pub fn at(mut self, span: Span) -> Self {
        let slot = match &mut self {
            Self::NameError { span, .. } => span,
            Self::TypeError { span, .. } => span,
            Self::UnboundMethod { span, .. } => span,
            Self::DivisionByZero { span } => span,
        };
        if slot.is_dummy() {
            *slot = span;
        }
        self
    }

    pub fn span(&self) -> Span {
        match self {
            Self::NameError { span, .. } => *span,
            Self::TypeError { span, .. } => *span,
            Self::UnboundMethod { span, .. } => *span,
            Self::DivisionByZero { span } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::NameError { name, span } => {
                Diagnostic::error(format!("name `{}` is not defined", name))
                    .with_code("E0301")
                    .with_label(Label::primary(*span, "not found in this scope"))
            }
            Self::TypeError { message, span } => Diagnostic::error(message.clone())
                .with_code("E0302")
                .with_label(Label::primary(*span, message.clone())),
            Self::UnboundMethod { method, class, span } => {
                Diagnostic::error(format!("class `{}` has no method `{}`", class, method))
                    .with_code("E0303")
                    .with_label(Label::primary(*span, "method lookup failed"))
                    .with_help("a method with the right name but a different parameter count does not match")
            }
            Self::DivisionByZero { span } => Diagnostic::error("division by zero")
                .with_code("E0304")
                .with_label(Label::primary(*span, "attempt to divide by zero")),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameError { name, .. } => write!(f, "name `{}` is not defined", name),
            Self::TypeError { message, .. } => write!(f, "{}", message),
            Self::UnboundMethod { method, class, .. } => {
                write!(f, "class `{}` has no method `{}`", class, method)
            }
            Self::DivisionByZero { .. } => write!(f, "division by zero"),
        }
    }
}

impl Error for RuntimeError {}
