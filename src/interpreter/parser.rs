use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt};
use crate::diagnostic::{Diagnostic, Label, Span};
use crate::lexer::{Lexer, LexerError, TokenKind};
use crate::object::{Class, Method, Value, SELF_NAME};

#[derive(Debug, Clone)]
pub struct ParseError {
    message: String,
    span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.message.clone())
            .with_code("E0201")
            .with_label(Label::primary(self.span, self.message.clone()))
    }
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        ParseError::new(err.message().to_string(), err.span())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl Error for ParseError {}

/// Recursive-descent parser over the lexer cursor, one token of lookahead.
///
/// Class names resolve while parsing: `ClassDefinition` and `NewInstance`
/// nodes hold the class itself, so by construction a class exists before any
/// instance of it is created.
pub struct Parser {
    lexer: Lexer,
    classes: HashMap<String, Rc<Class>>,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self {
            lexer,
            classes: HashMap::new(),
        }
    }

    pub fn parse(&mut self) -> Result<Stmt, ParseError> {
        let mut statements = Vec::new();
        while self.kind() != &TokenKind::Eof {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Stmt::Compound(statements))
    }

    fn kind(&self) -> &TokenKind {
        &self.lexer.current().kind
    }

    fn span(&self) -> Span {
        self.lexer.current().span
    }

    fn advance(&mut self) {
        self.lexer.advance();
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), ParseError> {
        self.lexer.expect_exact(&TokenKind::Char(c))?;
        self.advance();
        Ok(())
    }

    fn expect_id(&mut self) -> Result<String, ParseError> {
        let name = match self.kind() {
            TokenKind::Id(name) => name.clone(),
            other => {
                return Err(ParseError::new(
                    format!("expected an identifier, found {}", other),
                    self.span(),
                ))
            }
        };
        self.advance();
        Ok(name)
    }

    /// True at every token that may legally close a simple statement.
    fn at_line_break(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Else | TokenKind::Char(';')
        )
    }

    fn end_line(&mut self) -> Result<(), ParseError> {
        match self.kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            other => Err(ParseError::new(
                format!("expected end of line, found {}", other),
                self.span(),
            )),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.kind() {
            TokenKind::Class => self.parse_class_definition(),
            TokenKind::If => self.parse_if(),
            _ => self.parse_statement_line(),
        }
    }

    /// One physical line of simple statements separated by `;`. An `if` may
    /// close the line (`x = 0; if x: ...`); it swallows the line ending
    /// itself.
    fn parse_statement_line(&mut self) -> Result<Stmt, ParseError> {
        let mut statements = vec![self.parse_simple_statement()?];
        while self.eat(&TokenKind::Char(';')) {
            if self.at_line_break() {
                break;
            }
            if self.kind() == &TokenKind::If {
                statements.push(self.parse_if()?);
                return Ok(Stmt::Compound(statements));
            }
            statements.push(self.parse_simple_statement()?);
        }
        self.end_line()?;
        if statements.len() == 1 {
            Ok(statements.remove(0))
        } else {
            Ok(Stmt::Compound(statements))
        }
    }

    fn parse_simple_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.kind() {
            TokenKind::Print => {
                self.advance();
                let mut args = Vec::new();
                if !self.at_line_break() {
                    args.push(self.parse_expression()?);
                    while self.eat(&TokenKind::Char(',')) {
                        args.push(self.parse_expression()?);
                    }
                }
                Ok(Stmt::Print(args))
            }
            TokenKind::Return => {
                let span = self.span();
                self.advance();
                let value = if self.at_line_break() {
                    Expr::new(ExprKind::Literal(Value::None), span)
                } else {
                    self.parse_expression()?
                };
                Ok(Stmt::Return(value))
            }
            TokenKind::Id(name) if name.as_str() == "pass" => {
                self.advance();
                Ok(Stmt::Compound(Vec::new()))
            }
            _ => {
                let expr = self.parse_expression()?;
                if self.eat(&TokenKind::Char('=')) {
                    let value = self.parse_expression()?;
                    self.into_assignment(expr, value)
                } else {
                    Ok(Stmt::Expr(expr))
                }
            }
        }
    }

    /// Rewrites `a.b.c = value` into an assignment once the `=` shows up.
    fn into_assignment(&self, target: Expr, value: Expr) -> Result<Stmt, ParseError> {
        let span = target.span;
        let ExprKind::Variable(mut path) = target.kind else {
            return Err(ParseError::new("invalid assignment target", span));
        };
        if path.len() == 1 {
            return Ok(Stmt::Assignment {
                name: path.remove(0),
                value,
            });
        }
        let Some(field) = path.pop() else {
            return Err(ParseError::new("invalid assignment target", span));
        };
        Ok(Stmt::FieldAssignment {
            object: Expr::new(ExprKind::Variable(path), span),
            field,
            value,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // `if`
        let condition = self.parse_expression()?;
        self.expect_char(':')?;
        let (then_body, then_is_block) = self.parse_suite()?;

        if !then_is_block {
            match self.kind() {
                TokenKind::Newline => self.advance(),
                TokenKind::Eof | TokenKind::Else => {}
                other => {
                    return Err(ParseError::new(
                        format!("expected end of line, found {}", other),
                        self.span(),
                    ))
                }
            }
        }

        let else_body = if self.kind() == &TokenKind::Else {
            self.advance();
            self.expect_char(':')?;
            let (body, is_block) = self.parse_suite()?;
            if !is_block {
                self.end_line()?;
            }
            Some(Box::new(body))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_body: Box::new(then_body),
            else_body,
        })
    }

    /// A suite is either an indented block on the following lines, or a
    /// `;`-separated run of simple statements on the same line. The flag
    /// distinguishes the two so the caller knows whether a line ending is
    /// still pending.
    fn parse_suite(&mut self) -> Result<(Stmt, bool), ParseError> {
        if self.kind() == &TokenKind::Newline {
            self.advance();
            self.lexer.expect(&TokenKind::Indent)?;
            self.advance();
            let mut statements = Vec::new();
            while self.kind() != &TokenKind::Dedent {
                if self.kind() == &TokenKind::Eof {
                    return Err(ParseError::new(
                        "unexpected end of input inside an indented block",
                        self.span(),
                    ));
                }
                statements.push(self.parse_statement()?);
            }
            self.advance(); // Dedent
            Ok((Stmt::Compound(statements), true))
        } else {
            let mut statements = vec![self.parse_simple_statement()?];
            while self.eat(&TokenKind::Char(';')) {
                if self.at_line_break() {
                    break;
                }
                statements.push(self.parse_simple_statement()?);
            }
            let stmt = if statements.len() == 1 {
                statements.remove(0)
            } else {
                Stmt::Compound(statements)
            };
            Ok((stmt, false))
        }
    }

    fn parse_class_definition(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // `class`
        let name = self.expect_id()?;

        let parent = if self.eat(&TokenKind::Char('(')) {
            let parent_span = self.span();
            let parent_name = self.expect_id()?;
            self.expect_char(')')?;
            match self.classes.get(&parent_name) {
                Some(class) => Some(Rc::clone(class)),
                None => {
                    return Err(ParseError::new(
                        format!("unknown base class `{}`", parent_name),
                        parent_span,
                    ))
                }
            }
        } else {
            None
        };

        self.expect_char(':')?;
        self.lexer.expect(&TokenKind::Newline)?;
        self.advance();
        self.lexer.expect(&TokenKind::Indent)?;
        self.advance();

        let mut methods = Vec::new();
        while self.kind() != &TokenKind::Dedent {
            match self.kind() {
                TokenKind::Def => methods.push(self.parse_method()?),
                TokenKind::Id(name) if name.as_str() == "pass" => {
                    self.advance();
                    self.end_line()?;
                }
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        "unexpected end of input inside a class body",
                        self.span(),
                    ))
                }
                other => {
                    return Err(ParseError::new(
                        format!("expected a method definition, found {}", other),
                        self.span(),
                    ))
                }
            }
        }
        self.advance(); // Dedent

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, Rc::clone(&class));
        Ok(Stmt::ClassDefinition(class))
    }

    fn parse_method(&mut self) -> Result<Method, ParseError> {
        self.advance(); // `def`
        let name = self.expect_id()?;
        self.expect_char('(')?;

        let self_span = self.span();
        let first = self.expect_id()?;
        if first != SELF_NAME {
            return Err(ParseError::new(
                "the first parameter of a method must be `self`",
                self_span,
            ));
        }
        let mut formal_params = Vec::new();
        while self.eat(&TokenKind::Char(',')) {
            formal_params.push(self.expect_id()?);
        }
        self.expect_char(')')?;
        self.expect_char(':')?;

        let (body, is_block) = self.parse_suite()?;
        if !is_block {
            self.end_line()?;
        }
        Ok(Method {
            name,
            formal_params,
            body: Stmt::MethodBody(Box::new(body)),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op: BinaryOp::Or,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op: BinaryOp::And,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.kind() == &TokenKind::Not {
            let span = self.span();
            self.advance();
            let expr = self.parse_not()?;
            let span = span.merge(expr.span);
            Ok(Expr::new(ExprKind::Not(Box::new(expr)), span))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.kind() {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::LessOrEq => Some(BinaryOp::LessOrEq),
            TokenKind::GreaterOrEq => Some(BinaryOp::GreaterOrEq),
            TokenKind::Char('<') => Some(BinaryOp::Less),
            TokenKind::Char('>') => Some(BinaryOp::Greater),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        let span = left.span.merge(right.span);
        Ok(Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.kind() {
                TokenKind::Char('+') => BinaryOp::Add,
                TokenKind::Char('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_postfix()?;
        loop {
            let op = match self.kind() {
                TokenKind::Char('*') => BinaryOp::Mul,
                TokenKind::Char('/') => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_postfix()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.kind() == &TokenKind::Char('.') {
            self.advance();
            let method_span = self.span();
            let method = self.expect_id()?;
            if self.kind() != &TokenKind::Char('(') {
                return Err(ParseError::new(
                    "only a method call may follow an expression",
                    method_span,
                ));
            }
            let args = self.parse_call_args()?;
            let span = expr.span.merge(method_span);
            expr = Expr::new(
                ExprKind::MethodCall {
                    object: Box::new(expr),
                    method,
                    args,
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_char('(')?;
        let mut args = Vec::new();
        if self.kind() != &TokenKind::Char(')') {
            args.push(self.parse_expression()?);
            while self.eat(&TokenKind::Char(',')) {
                args.push(self.parse_expression()?);
            }
        }
        self.expect_char(')')?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        let kind = self.kind().clone();
        match kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::Number(n)), span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::str(s)), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::Bool(true)), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::Bool(false)), span))
            }
            TokenKind::None => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Value::None), span))
            }
            TokenKind::Char('(') => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_char(')')?;
                Ok(expr)
            }
            TokenKind::Id(name) => self.parse_name(name, span),
            other => Err(ParseError::new(
                format!("unexpected token {}", other),
                span,
            )),
        }
    }

    /// An identifier opens a dotted chain, a call on a class, or the
    /// `str(...)` builtin.
    fn parse_name(&mut self, name: String, span: Span) -> Result<Expr, ParseError> {
        self.advance();

        if name == "str" && self.kind() == &TokenKind::Char('(') {
            let mut args = self.parse_call_args()?;
            if args.len() != 1 {
                return Err(ParseError::new("str() takes exactly one argument", span));
            }
            let arg = args.remove(0);
            return Ok(Expr::new(ExprKind::Stringify(Box::new(arg)), span));
        }

        if self.kind() == &TokenKind::Char('(') {
            let Some(class) = self.classes.get(&name) else {
                return Err(ParseError::new(
                    format!("`{}` is not a known class", name),
                    span,
                ));
            };
            let class = Rc::clone(class);
            let args = self.parse_call_args()?;
            return Ok(Expr::new(ExprKind::NewInstance { class, args }, span));
        }

        let mut path = vec![name];
        let mut full_span = span;
        while self.kind() == &TokenKind::Char('.') {
            self.advance();
            let segment_span = self.span();
            let segment = self.expect_id()?;
            full_span = full_span.merge(segment_span);
            if self.kind() == &TokenKind::Char('(') {
                let args = self.parse_call_args()?;
                let object = Expr::new(ExprKind::Variable(path), span);
                return Ok(Expr::new(
                    ExprKind::MethodCall {
                        object: Box::new(object),
                        method: segment,
                        args,
                    },
                    full_span,
                ));
            }
            path.push(segment);
        }
        Ok(Expr::new(ExprKind::Variable(path), full_span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Stmt {
        let lexer = Lexer::new(source).expect("lexer failed");
        Parser::new(lexer).parse().expect("parse failed")
    }

    fn parse_err(source: &str) -> ParseError {
        let lexer = Lexer::new(source).expect("lexer failed");
        Parser::new(lexer).parse().expect_err("parse should fail")
    }

    fn statements(root: Stmt) -> Vec<Stmt> {
        match root {
            Stmt::Compound(stmts) => stmts,
            other => panic!("root should be a compound, got {:?}", other),
        }
    }

    #[test]
    fn assignment_targets() {
        let stmts = statements(parse("x = 1\na.b.c = 2"));
        assert!(matches!(&stmts[0], Stmt::Assignment { name, .. } if name == "x"));
        match &stmts[1] {
            Stmt::FieldAssignment { object, field, .. } => {
                assert_eq!(field, "c");
                assert!(
                    matches!(&object.kind, ExprKind::Variable(path) if path == &["a".to_string(), "b".to_string()])
                );
            }
            other => panic!("expected a field assignment, got {:?}", other),
        }
    }

    #[test]
    fn invalid_assignment_target() {
        let err = parse_err("1 + 2 = 3");
        assert!(err.message().contains("assignment target"));
    }

    #[test]
    fn semicolons_split_a_line() {
        let stmts = statements(parse("x = 1; print x; y = 2"));
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Stmt::Compound(inner) if inner.len() == 3));
    }

    #[test]
    fn inline_if_with_else_on_one_line() {
        let stmts = statements(parse("if x: print \"t\" else: print \"f\""));
        match &stmts[0] {
            Stmt::If { else_body, .. } => assert!(else_body.is_some()),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn block_if_with_else() {
        let source = "if x:\n  print 1\n  print 2\nelse:\n  print 3";
        let stmts = statements(parse(source));
        match &stmts[0] {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                assert!(matches!(&**then_body, Stmt::Compound(inner) if inner.len() == 2));
                assert!(else_body.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn inline_if_then_block_else() {
        let source = "if x: print 1\nelse:\n  print 2";
        let stmts = statements(parse(source));
        assert!(matches!(&stmts[0], Stmt::If { else_body: Some(_), .. }));
    }

    #[test]
    fn class_definition_registers_the_class() {
        let source = "\
class A:
  def f(self, x):
    return x

a = A()";
        let stmts = statements(parse(source));
        match &stmts[0] {
            Stmt::ClassDefinition(class) => {
                assert_eq!(class.name(), "A");
                let method = class.method("f").expect("method f");
                assert_eq!(method.formal_params, vec!["x".to_string()]);
                assert!(matches!(method.body, Stmt::MethodBody(_)));
            }
            other => panic!("expected a class definition, got {:?}", other),
        }
        assert!(matches!(&stmts[1], Stmt::Assignment { .. }));
    }

    #[test]
    fn inheritance_resolves_the_base_at_parse_time() {
        let source = "\
class A:
  pass
class B(A):
  pass";
        let stmts = statements(parse(source));
        match &stmts[1] {
            Stmt::ClassDefinition(class) => {
                assert_eq!(class.parent().expect("parent").name(), "A");
            }
            other => panic!("expected a class definition, got {:?}", other),
        }
    }

    #[test]
    fn unknown_base_class_is_rejected() {
        let err = parse_err("class B(Missing):\n  pass");
        assert!(err.message().contains("unknown base class"));
    }

    #[test]
    fn instantiating_an_unknown_name_is_rejected() {
        let err = parse_err("x = Missing()");
        assert!(err.message().contains("not a known class"));
    }

    #[test]
    fn methods_must_take_self_first() {
        let err = parse_err("class A:\n  def f(x):\n    return x");
        assert!(err.message().contains("`self`"));
    }

    #[test]
    fn str_builtin_and_method_chains() {
        let stmts = statements(parse("x = str(5)\ny = a.b.f(1, 2)"));
        assert!(matches!(
            &stmts[0],
            Stmt::Assignment { value: Expr { kind: ExprKind::Stringify(_), .. }, .. }
        ));
        match &stmts[1] {
            Stmt::Assignment { value, .. } => match &value.kind {
                ExprKind::MethodCall { object, method, args } => {
                    assert_eq!(method, "f");
                    assert_eq!(args.len(), 2);
                    assert!(matches!(&object.kind, ExprKind::Variable(path) if path.len() == 2));
                }
                other => panic!("expected a method call, got {:?}", other),
            },
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn chained_calls_on_call_results() {
        let source = "\
class A:
  def f(self):
    return self

x = A().f().f()";
        let stmts = statements(parse(source));
        match &stmts[1] {
            Stmt::Assignment { value, .. } => match &value.kind {
                ExprKind::MethodCall { object, .. } => {
                    assert!(matches!(&object.kind, ExprKind::MethodCall { .. }));
                }
                other => panic!("expected a method call, got {:?}", other),
            },
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn comparisons_do_not_chain() {
        let err = parse_err("x = 1 < 2 < 3");
        assert!(err.message().contains("expected end of line"));
    }

    #[test]
    fn field_access_on_an_expression_is_rejected() {
        let err = parse_err("class A:\n  pass\nx = A().field");
        assert!(err.message().contains("method call"));
    }
}
