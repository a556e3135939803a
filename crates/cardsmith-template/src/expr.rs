use std::fmt;

use crate::error::{Diagnostic, Pos};

// ── Syntax form ───────────────────────────────────────────────────────────

/// Expression syntax as parsed from a directive, before name resolution.
/// A chain is a head identifier followed by dot, call, and index segments;
/// whether the head is a variable, a module, or the `path` builtin is
/// decided later, when the enclosing scope is known.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprAst {
    Chain(Chain),
    Str(String),
    Num(f64),
    Not(Box<ExprAst>),
    Compare { lhs: Box<ExprAst>, rhs: Box<ExprAst>, negate: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub head: String,
    pub segs: Vec<ChainSeg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainSeg {
    Dot(String),
    Call(Vec<ExprAst>),
    Index(Vec<ExprAst>),
}

// ── Resolved form ─────────────────────────────────────────────────────────

/// A name-resolved expression, ready to evaluate against a card record.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A scope variable (`Data` or a `@for` variable) walked by steps.
    Path { root: String, steps: Vec<Step>, pos: Pos },
    /// A call into a referenced module, `module.func(args)`.
    ModuleCall { module: String, func: String, args: Vec<Expr>, pos: Pos },
    /// The `path(..)` builtin: resolves a relative path against the
    /// project root.
    ProjectPath { arg: Box<Expr>, pos: Pos },
    Str(String),
    Num(f64),
    Not(Box<Expr>, Pos),
    Compare { lhs: Box<Expr>, rhs: Box<Expr>, negate: bool, pos: Pos },
}

/// One step along a record path.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `.Name` — attribute lookup.
    Attr(String),
    /// `[n]` — child by index.
    Child(usize),
    /// `["Name"]` — all children with a name, a sequence.
    ChildrenNamed(String),
    /// `["Name", n]` — n-th child with a name.
    ChildNamed(String, usize),
    /// `.text()`
    Text,
    /// `.xml()`
    Xml,
    /// `.name()`
    NodeName,
    /// `.count()` — sequence length.
    Count,
}

impl Expr {
    /// Source position of the directive this expression came from, when
    /// the node can fail at runtime.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Expr::Path { pos, .. }
            | Expr::ModuleCall { pos, .. }
            | Expr::ProjectPath { pos, .. }
            | Expr::Not(_, pos)
            | Expr::Compare { pos, .. } => Some(*pos),
            Expr::Str(_) | Expr::Num(_) => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Path { root, steps, .. } => {
                f.write_str(root)?;
                for s in steps {
                    write!(f, "{s}")?;
                }
                Ok(())
            }
            Expr::ModuleCall { module, func, args, .. } => {
                write!(f, "{module}.{func}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Expr::ProjectPath { arg, .. } => write!(f, "path({arg})"),
            Expr::Str(s) => write!(f, "{s:?}"),
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Not(inner, _) => write!(f, "!{inner}"),
            Expr::Compare { lhs, rhs, negate, .. } => {
                write!(f, "{lhs} {} {rhs}", if *negate { "!=" } else { "==" })
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Attr(n) => write!(f, ".{n}"),
            Step::Child(i) => write!(f, "[{i}]"),
            Step::ChildrenNamed(n) => write!(f, "[{n:?}]"),
            Step::ChildNamed(n, i) => write!(f, "[{n:?}, {i}]"),
            Step::Text => f.write_str(".text()"),
            Step::Xml => f.write_str(".xml()"),
            Step::NodeName => f.write_str(".name()"),
            Step::Count => f.write_str(".count()"),
        }
    }
}

// ── Expression parsing ────────────────────────────────────────────────────

/// Parses one expression from a directive's source slice. Diagnostics
/// point at `pos`, the `@` that introduced the directive.
pub fn parse_expr(src: &str, pos: Pos) -> Result<ExprAst, Diagnostic> {
    let mut p = ExprParser::new(src, pos);
    let e = p.parse_compare()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.err(format!("unexpected '{}' in expression", p.rest_head())));
    }
    Ok(e)
}

/// Parses a `@for` head: `var in sequence-expression`.
pub fn parse_for_head(src: &str, pos: Pos) -> Result<(String, ExprAst), Diagnostic> {
    let mut p = ExprParser::new(src, pos);
    p.skip_ws();
    let var = p.expect_ident()?;
    if RESERVED.contains(&var.as_str()) {
        return Err(p.err(format!("'{var}' is reserved and cannot name a loop variable")));
    }
    p.skip_ws();
    let kw = p.expect_ident()?;
    if kw != "in" {
        return Err(p.err(format!("expected 'in' after loop variable, got '{kw}'")));
    }
    let seq = p.parse_compare()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.err(format!("unexpected '{}' after loop sequence", p.rest_head())));
    }
    Ok((var, seq))
}

const RESERVED: &[&str] = &["if", "else", "endif", "for", "endfor", "raw", "in"];

struct ExprParser<'s> {
    src: &'s str,
    pos: usize,
    at: Pos,
}

impl<'s> ExprParser<'s> {
    fn new(src: &'s str, at: Pos) -> Self {
        Self { src, pos: 0, at }
    }

    fn err(&self, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::error(msg, self.at)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.src[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest_head(&self) -> char {
        self.peek().unwrap_or(' ')
    }

    fn eat(&mut self, pat: &str) -> bool {
        if self.src[self.pos..].starts_with(pat) {
            self.pos += pat.len();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        self.skip_ws();
        let start = self.pos;
        if !matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_') {
            return Err(self.err("expected an identifier"));
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    // compare := unary (('==' | '!=') unary)?
    fn parse_compare(&mut self) -> Result<ExprAst, Diagnostic> {
        let lhs = self.parse_unary()?;
        self.skip_ws();
        let negate = if self.eat("==") {
            false
        } else if self.eat("!=") {
            true
        } else {
            return Ok(lhs);
        };
        let rhs = self.parse_unary()?;
        Ok(ExprAst::Compare { lhs: Box::new(lhs), rhs: Box::new(rhs), negate })
    }

    // unary := '!' unary | postfix
    fn parse_unary(&mut self) -> Result<ExprAst, Diagnostic> {
        self.skip_ws();
        if self.peek() == Some('!') && !self.src[self.pos..].starts_with("!=") {
            self.bump();
            return Ok(ExprAst::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    // postfix := primary chain-seg*
    fn parse_postfix(&mut self) -> Result<ExprAst, Diagnostic> {
        self.skip_ws();
        match self.peek() {
            Some('"') => {
                self.bump();
                Ok(ExprAst::Str(self.lex_string()?))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => self.lex_number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                let head = self.expect_ident()?;
                let mut segs = Vec::new();
                loop {
                    match self.peek() {
                        Some('.') => {
                            self.bump();
                            segs.push(ChainSeg::Dot(self.expect_ident()?));
                        }
                        Some('(') => {
                            self.bump();
                            segs.push(ChainSeg::Call(self.parse_args(')')?));
                        }
                        Some('[') => {
                            self.bump();
                            segs.push(ChainSeg::Index(self.parse_args(']')?));
                        }
                        _ => break,
                    }
                }
                Ok(ExprAst::Chain(Chain { head, segs }))
            }
            Some(c) => Err(self.err(format!("unexpected '{c}' in expression"))),
            None => Err(self.err("expected an expression")),
        }
    }

    /// Comma-separated expressions up to `close`. The opening bracket has
    /// already been consumed.
    fn parse_args(&mut self, close: char) -> Result<Vec<ExprAst>, Diagnostic> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.parse_compare()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(args),
                Some(c) => return Err(self.err(format!("expected ',' or '{close}', got '{c}'"))),
                None => return Err(self.err(format!("expected '{close}'"))),
            }
        }
    }

    fn lex_string(&mut self) -> Result<String, Diagnostic> {
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated string literal")),
                Some('"') => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some(c) => s.push(c),
                    None => return Err(self.err("unterminated escape sequence")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn lex_number(&mut self) -> Result<ExprAst, Diagnostic> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let s = &self.src[start..self.pos];
        s.parse::<f64>()
            .map(ExprAst::Num)
            .map_err(|_| self.err(format!("invalid number '{s}'")))
    }
}
