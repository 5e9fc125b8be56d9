use std::fmt;

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub style: LabelStyle,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn line_content(source: &str, line_num: usize) -> Option<&str> {
    source.lines().nth(line_num - 1)
}

pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    file_name: &'a str,
    use_color: bool,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str, file_name: &'a str, use_color: bool) -> Self {
        Self {
            source,
            file_name,
            use_color,
        }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();

        let severity = match diagnostic.severity {
            Severity::Error => self.paint("error", "1;31"),
            Severity::Warning => self.paint("warning", "1;33"),
        };
        match &diagnostic.code {
            Some(code) => out.push_str(&format!(
                "{}[{}]: {}\n",
                severity,
                code,
                self.paint(&diagnostic.message, "1")
            )),
            None => out.push_str(&format!(
                "{}: {}\n",
                severity,
                self.paint(&diagnostic.message, "1")
            )),
        }

        for label in &diagnostic.labels {
            if label.span.is_dummy() {
                continue;
            }
            self.render_label(&mut out, label);
        }

        for note in &diagnostic.notes {
            out.push_str(&format!("  {} {}\n", self.paint("=", "34"), note));
        }

        out
    }

    fn render_label(&self, out: &mut String, label: &Label) {
        let (line, col) = line_col(self.source, label.span.start);
        let Some(content) = line_content(self.source, line) else {
            return;
        };

        let gutter = line.to_string().len();
        out.push_str(&format!(
            "  {} {}:{}:{}\n",
            self.paint("-->", "34"),
            self.file_name,
            line,
            col
        ));
        out.push_str(&format!(
            "{} {}\n",
            " ".repeat(gutter + 1),
            self.paint("|", "34")
        ));
        out.push_str(&format!(
            "{} {} {}\n",
            self.paint(&line.to_string(), "34"),
            self.paint("|", "34"),
            content
        ));

        // Clamp the underline to the labelled line.
        let span_width = label.span.end.saturating_sub(label.span.start).max(1);
        let room = content.len().saturating_sub(col - 1).max(1);
        let marker = match label.style {
            LabelStyle::Primary => "^".repeat(span_width.min(room)),
            LabelStyle::Secondary => "-".repeat(span_width.min(room)),
        };
        let marker = match label.style {
            LabelStyle::Primary => self.paint(&marker, "31"),
            LabelStyle::Secondary => self.paint(&marker, "34"),
        };
        out.push_str(&format!(
            "{} {} {}{} {}\n",
            " ".repeat(gutter + 1),
            self.paint("|", "34"),
            " ".repeat(col - 1),
            marker,
            label.message
        ));
    }

    fn paint(&self, text: &str, style: &str) -> String {
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", style, text)
        } else {
            text.to_string()
        }
    }
}

pub fn render_diagnostics(
    source: &str,
    file_name: &str,
    diagnostics: &[Diagnostic],
    use_color: bool,
) -> String {
    let renderer = DiagnosticRenderer::new(source, file_name, use_color);
    let mut out = String::new();

    for diagnostic in diagnostics {
        out.push_str(&renderer.render(diagnostic));
        out.push('\n');
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    if errors > 0 {
        out.push_str(&format!(
            "error: aborting due to {} error{}\n",
            errors,
            if errors == 1 { "" } else { "s" }
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_walks_lines() {
        let source = "x = 5\ny = 10\n";
        assert_eq!(line_col(source, 0), (1, 1));
        assert_eq!(line_col(source, 4), (1, 5));
        assert_eq!(line_col(source, 6), (2, 1));
        assert_eq!(line_col(source, 10), (2, 5));
    }

    #[test]
    fn span_merge_covers_both() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
    }

    #[test]
    fn renders_code_and_location() {
        let source = "print 7 / 0\n";
        let diagnostic = Diagnostic::error("division by zero")
            .with_code("E0304")
            .with_label(Label::primary(Span::new(6, 11), "attempt to divide by zero"));

        let rendered = DiagnosticRenderer::new(source, "script", false).render(&diagnostic);
        assert!(rendered.contains("error[E0304]"));
        assert!(rendered.contains("division by zero"));
        assert!(rendered.contains("script:1:7"));
        assert!(rendered.contains("^^^^^"));
    }

    #[test]
    fn dummy_spans_render_headline_only() {
        let diagnostic = Diagnostic::error("something went wrong")
            .with_label(Label::primary(Span::dummy(), "here"));
        let rendered = DiagnosticRenderer::new("", "script", false).render(&diagnostic);
        assert_eq!(rendered, "error: something went wrong\n");
    }
}
