use std::error::Error;
use std::fmt;
use std::mem;

use crate::diagnostic::{Diagnostic, Label, Span};

/// One lexical unit. Valued variants compare by payload as well as variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Valued lexemes.
    Number(i64),
    Id(String),
    String(String),
    Char(char),

    // Keywords.
    Class,
    Return,
    If,
    Else,
    Def,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,

    // Two-character operators.
    Eq,
    NotEq,
    LessOrEq,
    GreaterOrEq,

    // Structural markers synthesized by the lexer.
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(value) => write!(f, "Number{{{}}}", value),
            TokenKind::Id(name) => write!(f, "Id{{{}}}", name),
            TokenKind::String(text) => write!(f, "String{{{}}}", text),
            TokenKind::Char(c) => write!(f, "Char{{{}}}", c),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub struct LexerError {
    message: String,
    span: Span,
}

impl LexerError {
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
            .with_code("E0101")
            .with_label(Label::primary(self.span, self.message.clone()))
    }
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lexical error: {}", self.message)
    }
}

impl Error for LexerError {}

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "class" => Some(TokenKind::Class),
        "return" => Some(TokenKind::Return),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "def" => Some(TokenKind::Def),
        "print" => Some(TokenKind::Print),
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Not),
        "None" => Some(TokenKind::None),
        "True" => Some(TokenKind::True),
        "False" => Some(TokenKind::False),
        _ => None,
    }
}

fn is_punctuator(c: char) -> bool {
    matches!(
        c,
        '.' | ','
            | '('
            | ')'
            | '+'
            | '-'
            | '*'
            | '/'
            | ':'
            | '@'
            | '%'
            | '$'
            | '^'
            | '&'
            | ';'
            | '?'
            | '='
            | '<'
            | '>'
            | '!'
            | '{'
            | '}'
            | '['
            | ']'
    )
}

/// A line is skipped entirely when it holds only spaces, optionally followed
/// by a `#` comment.
fn is_blank(line: &str) -> bool {
    for c in line.chars() {
        match c {
            ' ' => {}
            '#' => return true,
            _ => return false,
        }
    }
    true
}

/// Indentation-sensitive lexer. The whole token stream is materialized at
/// construction; a cursor provides one token of lookahead for the parser.
///
/// Block structure is recovered from leading spaces: the indent level moves
/// in steps of two spaces, and every step emits a synthetic `Indent` or
/// `Dedent` token. The stream always ends with a single `Eof`, never
/// directly preceded by `Newline`, with the indent level back at zero.
#[derive(Debug)]
pub struct Lexer {
    tokens: Vec<Token>,
    pos: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Result<Self, LexerError> {
        let tokens = Scanner::default().scan(source)?;
        Ok(Self { tokens, pos: 0 })
    }

    /// Token under the cursor. Starts at the first token of the stream.
    pub fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    /// Move the cursor forward and return the new current token. Once `Eof`
    /// is reached the cursor stays there.
    pub fn advance(&mut self) -> &Token {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        self.current()
    }

    /// Require the current token to have the same variant as `kind`,
    /// ignoring payloads.
    pub fn expect(&self, kind: &TokenKind) -> Result<&Token, LexerError> {
        let current = self.current();
        if mem::discriminant(&current.kind) == mem::discriminant(kind) {
            Ok(current)
        } else {
            Err(LexerError::new(
                format!("expected {}, found {}", kind, current.kind),
                current.span,
            ))
        }
    }

    /// Require the current token to equal `kind`, payload included.
    pub fn expect_exact(&self, kind: &TokenKind) -> Result<&Token, LexerError> {
        let current = self.current();
        if current.kind == *kind {
            Ok(current)
        } else {
            Err(LexerError::new(
                format!("expected {}, found {}", kind, current.kind),
                current.span,
            ))
        }
    }

    pub fn expect_next(&mut self, kind: &TokenKind) -> Result<&Token, LexerError> {
        self.advance();
        self.expect(kind)
    }

    pub fn expect_next_exact(&mut self, kind: &TokenKind) -> Result<&Token, LexerError> {
        self.advance();
        self.expect_exact(kind)
    }

    /// The fully materialized stream, for dumps and tests.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

#[derive(Default)]
struct Scanner {
    tokens: Vec<Token>,
    indent: usize,
}

impl Scanner {
    fn scan(mut self, source: &str) -> Result<Vec<Token>, LexerError> {
        let mut offset = 0;
        for raw in source.split_inclusive('\n') {
            self.scan_line(raw, offset)?;
            offset += raw.len();
        }

        let end = Span::new(source.len(), source.len());
        if self.indent == 0 {
            // Invariant: Eof is never directly preceded by Newline.
            if matches!(self.tokens.last(), Some(t) if t.kind == TokenKind::Newline) {
                self.tokens.pop();
            }
        }
        while self.indent > 0 {
            self.indent = self.indent.saturating_sub(2);
            self.tokens.push(Token::new(TokenKind::Dedent, end));
        }
        self.tokens.push(Token::new(TokenKind::Eof, end));
        Ok(self.tokens)
    }

    fn scan_line(&mut self, raw: &str, offset: usize) -> Result<(), LexerError> {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if is_blank(line) {
            return Ok(());
        }

        let leading = line.chars().take_while(|c| *c == ' ').count();
        self.set_indent(leading, offset);
        self.scan_body(line, leading, offset)?;

        if !matches!(self.tokens.last(), Some(t) if t.kind == TokenKind::Newline) {
            let end = offset + line.len();
            self.tokens
                .push(Token::new(TokenKind::Newline, Span::new(end, end + 1)));
        }
        Ok(())
    }

    fn set_indent(&mut self, leading: usize, offset: usize) {
        let span = Span::new(offset, offset + leading);
        if leading > self.indent {
            while self.indent < leading {
                self.indent += 2;
                self.tokens.push(Token::new(TokenKind::Indent, span));
            }
        } else {
            while self.indent > leading {
                self.indent = self.indent.saturating_sub(2);
                self.tokens.push(Token::new(TokenKind::Dedent, span));
            }
        }
    }

    fn scan_body(&mut self, line: &str, start: usize, offset: usize) -> Result<(), LexerError> {
        let mut chars = line[start..].char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let pos = offset + start + i;
            match c {
                ' ' => {}
                '#' => break,
                '0'..='9' => {
                    let mut end = i + 1;
                    while let Some(&(j, d)) = chars.peek() {
                        if d.is_ascii_digit() {
                            end = j + 1;
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let text = &line[start + i..start + end];
                    let span = Span::new(pos, offset + start + end);
                    let value: i64 = text.parse().map_err(|_| {
                        LexerError::new(
                            format!("numeric literal `{}` is out of range", text),
                            span,
                        )
                    })?;
                    self.tokens.push(Token::new(TokenKind::Number(value), span));
                }
                '"' | '\'' => {
                    let quote = c;
                    let mut text = String::new();
                    let mut end = i + 1;
                    let mut closed = false;
                    while let Some((j, ch)) = chars.next() {
                        end = j + ch.len_utf8();
                        if ch == quote {
                            closed = true;
                            break;
                        }
                        if ch == '\\' {
                            match chars.next() {
                                Some((k, esc)) => {
                                    end = k + esc.len_utf8();
                                    match esc {
                                        'n' => text.push('\n'),
                                        't' => text.push('\t'),
                                        other => text.push(other),
                                    }
                                }
                                // Trailing backslash, the quote can no
                                // longer close on this line.
                                None => break,
                            }
                        } else {
                            text.push(ch);
                        }
                    }
                    if !closed {
                        return Err(LexerError::new(
                            "unterminated string literal",
                            Span::new(pos, offset + start + end),
                        ));
                    }
                    self.tokens.push(Token::new(
                        TokenKind::String(text),
                        Span::new(pos, offset + start + end),
                    ));
                }
                c if c == '_' || c.is_ascii_alphabetic() => {
                    let mut end = i + 1;
                    while let Some(&(j, ch)) = chars.peek() {
                        if ch == '_' || ch.is_ascii_alphanumeric() {
                            end = j + 1;
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let word = &line[start + i..start + end];
                    let span = Span::new(pos, offset + start + end);
                    let kind = keyword(word).unwrap_or_else(|| TokenKind::Id(word.to_string()));
                    self.tokens.push(Token::new(kind, span));
                }
                c if is_punctuator(c) => {
                    let compound = matches!(c, '=' | '!' | '<' | '>')
                        && matches!(chars.peek(), Some((_, '=')));
                    if compound {
                        chars.next();
                        let kind = match c {
                            '=' => TokenKind::Eq,
                            '!' => TokenKind::NotEq,
                            '<' => TokenKind::LessOrEq,
                            _ => TokenKind::GreaterOrEq,
                        };
                        self.tokens.push(Token::new(kind, Span::new(pos, pos + 2)));
                    } else {
                        self.tokens
                            .push(Token::new(TokenKind::Char(c), Span::new(pos, pos + 1)));
                    }
                }
                _ => {
                    return Err(LexerError::new(
                        format!("unexpected character `{}`", c),
                        Span::new(pos, pos + c.len_utf8()),
                    ));
                }
            }
        }
        Ok(())
    }
}
