use std::fmt;

// ── Pos ───────────────────────────────────────────────────────────────────

/// A 1-based line/column position in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub const START: Pos = Pos { line: 1, col: 1 };

    #[inline]
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Advances past one character, tracking line breaks.
    #[inline]
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ── Diagnostic ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One structured compile diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, pos: Pos) -> Self {
        Self { pos, severity: Severity::Error, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.pos, self.message)
    }
}

// ── CompileError ──────────────────────────────────────────────────────────

/// Template compilation failure: one or more structured diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn single(message: impl Into<String>, pos: Pos) -> Self {
        Self { diagnostics: vec![Diagnostic::error(message, pos)] }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnostics.as_slice() {
            [one] => write!(f, "template compile error: {one}"),
            many => write!(f, "template compile error: {} diagnostics", many.len()),
        }
    }
}

impl std::error::Error for CompileError {}

// ── ExecError ─────────────────────────────────────────────────────────────

/// Failure raised while a compiled unit executes against a card record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecError {
    pub message: String,
    /// Source position of the directive that failed, when known.
    pub pos: Option<Pos>,
}

impl ExecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), pos: None }
    }

    pub fn at(message: impl Into<String>, pos: Pos) -> Self {
        Self { message: message.into(), pos: Some(pos) }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "template execution error at {pos}: {}", self.message),
            None => write!(f, "template execution error: {}", self.message),
        }
    }
}

impl std::error::Error for ExecError {}
