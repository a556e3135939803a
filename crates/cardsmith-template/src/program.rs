use std::fmt::Write as _;

use crate::error::Pos;
use crate::expr::Expr;

/// A compiled template: structured ops plus the module names its
/// reference comments declared.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub ops: Vec<Op>,
    pub references: Vec<String>,
}

/// One operation of a compiled template. Literal markup and directive
/// output both flow through the same output buffer; the `Attr*` ops
/// carry the single-slot attribute protocol for directives that appear
/// inside quoted attribute values.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Verbatim template text.
    Literal(String),
    /// `@expr` — evaluate and write escaped.
    Emit(Expr),
    /// `@raw(expr)` — evaluate and write verbatim.
    EmitRaw(Expr),
    /// Open an attribute slot; `prefix` is the markup from the space
    /// before the attribute name through the opening quote.
    AttrBegin { name: String, prefix: String },
    /// Verbatim text inside an open attribute value.
    AttrLiteral(String),
    /// Directive output inside an open attribute value.
    AttrEmit { expr: Expr, raw: bool },
    /// Close the attribute slot; `suffix` is the closing quote.
    AttrEnd { suffix: String },
    If { cond: Expr, then_ops: Vec<Op>, else_ops: Vec<Op>, pos: Pos },
    For { var: String, seq: Expr, body: Vec<Op>, pos: Pos },
}

impl Program {
    /// Indented tree listing, one op per line. This is the debug artifact
    /// the tree backend hands out for a compiled template.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if !self.references.is_empty() {
            let _ = writeln!(out, "references: {}", self.references.join(", "));
        }
        dump_ops(&self.ops, 0, &mut out);
        out
    }
}

fn dump_ops(ops: &[Op], depth: usize, out: &mut String) {
    for op in ops {
        let pad = "  ".repeat(depth);
        match op {
            Op::Literal(s) => {
                let _ = writeln!(out, "{pad}literal     {s:?}");
            }
            Op::Emit(e) => {
                let _ = writeln!(out, "{pad}emit        {e}");
            }
            Op::EmitRaw(e) => {
                let _ = writeln!(out, "{pad}emit.raw    {e}");
            }
            Op::AttrBegin { name, prefix } => {
                let _ = writeln!(out, "{pad}attr.begin  {name} {prefix:?}");
            }
            Op::AttrLiteral(s) => {
                let _ = writeln!(out, "{pad}attr.lit    {s:?}");
            }
            Op::AttrEmit { expr, raw } => {
                let tag = if *raw { "attr.raw" } else { "attr.emit" };
                let _ = writeln!(out, "{pad}{tag:<11} {expr}");
            }
            Op::AttrEnd { suffix } => {
                let _ = writeln!(out, "{pad}attr.end    {suffix:?}");
            }
            Op::If { cond, then_ops, else_ops, .. } => {
                let _ = writeln!(out, "{pad}if          {cond}");
                dump_ops(then_ops, depth + 1, out);
                if !else_ops.is_empty() {
                    let _ = writeln!(out, "{pad}else");
                    dump_ops(else_ops, depth + 1, out);
                }
            }
            Op::For { var, seq, body, .. } => {
                let _ = writeln!(out, "{pad}for         {var} in {seq}");
                dump_ops(body, depth + 1, out);
            }
        }
    }
}
