use crate::error::{CompileError, Diagnostic, Pos};
use crate::expr::{parse_expr, parse_for_head, Chain, ChainSeg, Expr, ExprAst, Step};
use crate::lexer::{lex, Segment};
use crate::program::{Op, Program};

/// Parses template source into a program, resolving every directive
/// expression against the scope in effect where it appears. `modules`
/// is the list of module names declared by reference comments; calls
/// into any other head identifier are unknown names.
///
/// Expression-level problems are collected so one compile reports them
/// all; a malformed block structure stops the walk at once, since ops
/// after an unmatched directive have no meaningful parent.
pub fn parse_template(src: &str, modules: &[String]) -> Result<Program, CompileError> {
    let segments = lex(src).map_err(|d| CompileError::new(vec![d]))?;
    let mut b = Builder::new(modules);
    match b.build(segments) {
        Ok(ops) => {
            if b.diagnostics.is_empty() {
                Ok(Program { ops, references: modules.to_vec() })
            } else {
                Err(CompileError::new(b.diagnostics))
            }
        }
        Err(d) => {
            b.diagnostics.push(d);
            Err(CompileError::new(b.diagnostics))
        }
    }
}

// ── Block frames ──────────────────────────────────────────────────────────

enum Frame {
    Root,
    If { cond: Expr, pos: Pos, then_ops: Option<Vec<Op>> },
    For { var: String, seq: Expr, pos: Pos },
}

impl Frame {
    fn describe(&self) -> (&'static str, Pos) {
        match self {
            Frame::Root => ("template", Pos::START),
            Frame::If { pos, .. } => ("@if", *pos),
            Frame::For { pos, .. } => ("@for", *pos),
        }
    }
}

struct Builder<'a> {
    modules: &'a [String],
    scope: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    stack: Vec<(Frame, Vec<Op>)>,
}

impl<'a> Builder<'a> {
    fn new(modules: &'a [String]) -> Self {
        Self {
            modules,
            scope: Vec::new(),
            diagnostics: Vec::new(),
            stack: vec![(Frame::Root, Vec::new())],
        }
    }

    fn push(&mut self, op: Op) {
        // stack always holds at least the root frame
        if let Some((_, ops)) = self.stack.last_mut() {
            ops.push(op);
        }
    }

    fn build(&mut self, segments: Vec<Segment>) -> Result<Vec<Op>, Diagnostic> {
        for seg in segments {
            match seg {
                Segment::Literal(s) => self.push(Op::Literal(s)),
                Segment::AttrBegin { name, prefix } => self.push(Op::AttrBegin { name, prefix }),
                Segment::AttrLiteral(s) => self.push(Op::AttrLiteral(s)),
                Segment::AttrEnd { suffix } => self.push(Op::AttrEnd { suffix }),
                Segment::AttrExpr { src, raw, pos } => {
                    let expr = self.resolve_src(&src, pos);
                    self.push(Op::AttrEmit { expr, raw });
                }
                Segment::Expr { src, raw, pos } => {
                    let expr = self.resolve_src(&src, pos);
                    self.push(if raw { Op::EmitRaw(expr) } else { Op::Emit(expr) });
                }
                Segment::If { cond_src, pos } => {
                    let cond = self.resolve_src(&cond_src, pos);
                    self.stack.push((Frame::If { cond, pos, then_ops: None }, Vec::new()));
                }
                Segment::Else { pos } => self.on_else(pos)?,
                Segment::EndIf { pos } => self.on_endif(pos)?,
                Segment::For { head_src, pos } => {
                    let (var, seq) = match parse_for_head(&head_src, pos) {
                        Ok((var, ast)) => {
                            // the sequence is evaluated outside the loop,
                            // so resolve it before the variable is in scope
                            let seq = self.resolve(ast, pos);
                            (var, seq)
                        }
                        Err(d) => {
                            self.diagnostics.push(d);
                            (String::from("_"), Expr::Str(String::new()))
                        }
                    };
                    self.scope.push(var.clone());
                    self.stack.push((Frame::For { var, seq, pos }, Vec::new()));
                }
                Segment::EndFor { pos } => self.on_endfor(pos)?,
            }
        }
        match self.stack.pop() {
            Some((Frame::Root, ops)) if self.stack.is_empty() => Ok(ops),
            Some((frame, _)) => {
                let (what, pos) = frame.describe();
                Err(Diagnostic::error(
                    format!("{what} at {pos} is never closed"),
                    pos,
                ))
            }
            None => Ok(Vec::new()),
        }
    }

    fn on_else(&mut self, pos: Pos) -> Result<(), Diagnostic> {
        match self.stack.last_mut() {
            Some((Frame::If { then_ops, .. }, ops)) => {
                if then_ops.is_some() {
                    return Err(Diagnostic::error("duplicate @else in the same @if", pos));
                }
                *then_ops = Some(std::mem::take(ops));
                Ok(())
            }
            _ => Err(Diagnostic::error("@else without a matching @if", pos)),
        }
    }

    fn on_endif(&mut self, pos: Pos) -> Result<(), Diagnostic> {
        match self.stack.pop() {
            Some((Frame::If { cond, pos: if_pos, then_ops }, ops)) => {
                let (then_ops, else_ops) = match then_ops {
                    Some(t) => (t, ops),
                    None => (ops, Vec::new()),
                };
                self.push(Op::If { cond, then_ops, else_ops, pos: if_pos });
                Ok(())
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(Diagnostic::error("@endif without a matching @if", pos))
            }
            None => Err(Diagnostic::error("@endif without a matching @if", pos)),
        }
    }

    fn on_endfor(&mut self, pos: Pos) -> Result<(), Diagnostic> {
        match self.stack.pop() {
            Some((Frame::For { var, seq, pos: for_pos }, body)) => {
                self.scope.pop();
                self.push(Op::For { var, seq, body, pos: for_pos });
                Ok(())
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(Diagnostic::error("@endfor without a matching @for", pos))
            }
            None => Err(Diagnostic::error("@endfor without a matching @for", pos)),
        }
    }

    // ── Name resolution ───────────────────────────────────────────────────

    fn resolve_src(&mut self, src: &str, pos: Pos) -> Expr {
        match parse_expr(src, pos) {
            Ok(ast) => self.resolve(ast, pos),
            Err(d) => {
                self.diagnostics.push(d);
                Expr::Str(String::new())
            }
        }
    }

    fn diag(&mut self, msg: String, pos: Pos) -> Expr {
        self.diagnostics.push(Diagnostic::error(msg, pos));
        Expr::Str(String::new())
    }

    fn in_scope(&self, name: &str) -> bool {
        name == "Data" || self.scope.iter().any(|v| v == name)
    }

    fn resolve(&mut self, ast: ExprAst, pos: Pos) -> Expr {
        match ast {
            ExprAst::Str(s) => Expr::Str(s),
            ExprAst::Num(n) => Expr::Num(n),
            ExprAst::Not(inner) => Expr::Not(Box::new(self.resolve(*inner, pos)), pos),
            ExprAst::Compare { lhs, rhs, negate } => Expr::Compare {
                lhs: Box::new(self.resolve(*lhs, pos)),
                rhs: Box::new(self.resolve(*rhs, pos)),
                negate,
                pos,
            },
            ExprAst::Chain(c) => self.resolve_chain(c, pos),
        }
    }

    fn resolve_chain(&mut self, c: Chain, pos: Pos) -> Expr {
        if self.in_scope(&c.head) {
            let root = c.head;
            let steps = self.resolve_steps(&root, c.segs, pos);
            return Expr::Path { root, steps, pos };
        }
        if c.head == "path" {
            return self.resolve_project_path(c.segs, pos);
        }
        if self.modules.iter().any(|m| m == &c.head) {
            return self.resolve_module_call(c.head, c.segs, pos);
        }
        self.diag(format!("unknown name '{}'", c.head), pos)
    }

    fn resolve_project_path(&mut self, segs: Vec<ChainSeg>, pos: Pos) -> Expr {
        let mut segs = segs.into_iter();
        match (segs.next(), segs.next()) {
            (Some(ChainSeg::Call(mut args)), None) if args.len() == 1 => {
                let arg = self.resolve(args.remove(0), pos);
                Expr::ProjectPath { arg: Box::new(arg), pos }
            }
            _ => self.diag("path() takes exactly one argument".into(), pos),
        }
    }

    fn resolve_module_call(&mut self, module: String, segs: Vec<ChainSeg>, pos: Pos) -> Expr {
        let mut segs = segs.into_iter();
        match (segs.next(), segs.next(), segs.next()) {
            (Some(ChainSeg::Dot(func)), Some(ChainSeg::Call(args)), None) => {
                let args = args.into_iter().map(|a| self.resolve(a, pos)).collect();
                Expr::ModuleCall { module, func, args, pos }
            }
            _ => self.diag(
                format!("module '{module}' must be called as {module}.function(..)"),
                pos,
            ),
        }
    }

    fn resolve_steps(&mut self, root: &str, segs: Vec<ChainSeg>, pos: Pos) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut it = segs.into_iter().peekable();
        while let Some(seg) = it.next() {
            match seg {
                ChainSeg::Dot(name) => {
                    if matches!(it.peek(), Some(ChainSeg::Call(_))) {
                        let args = match it.next() {
                            Some(ChainSeg::Call(a)) => a,
                            _ => Vec::new(),
                        };
                        if !args.is_empty() {
                            self.diag(format!("{name}() takes no arguments"), pos);
                            continue;
                        }
                        match name.as_str() {
                            "text" => steps.push(Step::Text),
                            "xml" => steps.push(Step::Xml),
                            "name" => steps.push(Step::NodeName),
                            "count" => steps.push(Step::Count),
                            _ => {
                                self.diag(
                                    format!("unknown method '{name}()' on a record path"),
                                    pos,
                                );
                            }
                        }
                    } else {
                        steps.push(Step::Attr(name));
                    }
                }
                ChainSeg::Call(_) => {
                    self.diag(format!("'{root}' is not callable"), pos);
                }
                ChainSeg::Index(args) => {
                    if let Some(step) = self.index_step(args, pos) {
                        steps.push(step);
                    }
                }
            }
        }
        steps
    }

    fn index_step(&mut self, args: Vec<ExprAst>, pos: Pos) -> Option<Step> {
        match args.as_slice() {
            [ExprAst::Num(n)] => self.child_index(*n, pos).map(Step::Child),
            [ExprAst::Str(name)] => Some(Step::ChildrenNamed(name.clone())),
            [ExprAst::Str(name), ExprAst::Num(n)] => {
                self.child_index(*n, pos).map(|i| Step::ChildNamed(name.clone(), i))
            }
            _ => {
                self.diag(
                    "invalid index: use [n], [\"Name\"], or [\"Name\", n]".into(),
                    pos,
                );
                None
            }
        }
    }

    fn child_index(&mut self, n: f64, pos: Pos) -> Option<usize> {
        if n >= 0.0 && n.fract() == 0.0 {
            Some(n as usize)
        } else {
            self.diag("child index must be a non-negative integer".into(), pos);
            None
        }
    }
}
