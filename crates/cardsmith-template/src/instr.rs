use std::fmt::Write as _;

use cardsmith_record::Record;

use crate::compile::{Backend, TemplateUnit, UnitEnv};
use crate::emit::Emitter;
use crate::error::ExecError;
use crate::eval::EvalCtx;
use crate::expr::Expr;
use crate::program::{Op, Program};
use crate::value::Value;

/// Lowers the op tree to a flat instruction list executed by a small
/// loop. This is the production backend; its numbered listing is the
/// per-template debug artifact a generation session writes to disk.
pub struct InstructionBackend;

impl Backend for InstructionBackend {
    fn compile(&self, program: Program, env: UnitEnv) -> Box<dyn TemplateUnit> {
        let mut code = Vec::new();
        lower(&program.ops, &mut code);
        let listing = listing(&code, &program.references);
        Box::new(InstrUnit { code, env, listing })
    }
}

#[derive(Debug, Clone)]
enum Instr {
    Literal(String),
    Emit(Expr),
    EmitRaw(Expr),
    AttrBegin { name: String, prefix: String },
    AttrLiteral(String),
    AttrEmit { expr: Expr, raw: bool },
    AttrEnd { suffix: String },
    /// Falls through when the condition holds, else jumps to `target`.
    JumpIfFalse { cond: Expr, target: usize },
    Jump(usize),
    /// Evaluates the sequence; binds `var` to the first item or jumps to
    /// `exit` when the sequence is empty.
    IterStart { var: String, seq: Expr, exit: usize },
    /// Advances the innermost iteration: rebinds and jumps back to
    /// `body`, or falls through with the iteration unwound.
    IterNext { body: usize },
}

fn lower(ops: &[Op], code: &mut Vec<Instr>) {
    for op in ops {
        match op {
            Op::Literal(s) => code.push(Instr::Literal(s.clone())),
            Op::Emit(e) => code.push(Instr::Emit(e.clone())),
            Op::EmitRaw(e) => code.push(Instr::EmitRaw(e.clone())),
            Op::AttrBegin { name, prefix } => {
                code.push(Instr::AttrBegin { name: name.clone(), prefix: prefix.clone() });
            }
            Op::AttrLiteral(s) => code.push(Instr::AttrLiteral(s.clone())),
            Op::AttrEmit { expr, raw } => {
                code.push(Instr::AttrEmit { expr: expr.clone(), raw: *raw });
            }
            Op::AttrEnd { suffix } => code.push(Instr::AttrEnd { suffix: suffix.clone() }),
            Op::If { cond, then_ops, else_ops, .. } => {
                let branch = code.len();
                code.push(Instr::JumpIfFalse { cond: cond.clone(), target: 0 });
                lower(then_ops, code);
                if else_ops.is_empty() {
                    let end = code.len();
                    patch_jump(code, branch, end);
                } else {
                    let skip_else = code.len();
                    code.push(Instr::Jump(0));
                    let else_at = code.len();
                    patch_jump(code, branch, else_at);
                    lower(else_ops, code);
                    let end = code.len();
                    patch_jump(code, skip_else, end);
                }
            }
            Op::For { var, seq, body, .. } => {
                let start = code.len();
                code.push(Instr::IterStart { var: var.clone(), seq: seq.clone(), exit: 0 });
                let body_at = code.len();
                lower(body, code);
                code.push(Instr::IterNext { body: body_at });
                let end = code.len();
                patch_jump(code, start, end);
            }
        }
    }
}

fn patch_jump(code: &mut [Instr], at: usize, to: usize) {
    match &mut code[at] {
        Instr::JumpIfFalse { target, .. } => *target = to,
        Instr::Jump(target) => *target = to,
        Instr::IterStart { exit, .. } => *exit = to,
        _ => {}
    }
}

fn listing(code: &[Instr], references: &[String]) -> String {
    let mut out = String::new();
    if !references.is_empty() {
        let _ = writeln!(out, "references: {}", references.join(", "));
    }
    for (i, instr) in code.iter().enumerate() {
        let _ = write!(out, "{i:04}  ");
        let _ = match instr {
            Instr::Literal(s) => writeln!(out, "{:<12}{s:?}", "literal"),
            Instr::Emit(e) => writeln!(out, "{:<12}{e}", "emit"),
            Instr::EmitRaw(e) => writeln!(out, "{:<12}{e}", "emit.raw"),
            Instr::AttrBegin { name, prefix } => {
                writeln!(out, "{:<12}{name} {prefix:?}", "attr.begin")
            }
            Instr::AttrLiteral(s) => writeln!(out, "{:<12}{s:?}", "attr.lit"),
            Instr::AttrEmit { expr, raw } => {
                writeln!(out, "{:<12}{expr}", if *raw { "attr.raw" } else { "attr.emit" })
            }
            Instr::AttrEnd { suffix } => writeln!(out, "{:<12}{suffix:?}", "attr.end"),
            Instr::JumpIfFalse { cond, target } => {
                writeln!(out, "{:<12}{cond} -> {target:04}", "jump.false")
            }
            Instr::Jump(target) => writeln!(out, "{:<12}-> {target:04}", "jump"),
            Instr::IterStart { var, seq, exit } => {
                writeln!(out, "{:<12}{var} in {seq} -> {exit:04}", "iter.start")
            }
            Instr::IterNext { body } => writeln!(out, "{:<12}-> {body:04}", "iter.next"),
        };
    }
    out
}

struct InstrUnit {
    code: Vec<Instr>,
    env: UnitEnv,
    listing: String,
}

struct IterState {
    items: Vec<Record>,
    index: usize,
}

impl TemplateUnit for InstrUnit {
    fn execute(&self, card: &Record) -> Result<String, ExecError> {
        let mut em = Emitter::new();
        let mut ctx = EvalCtx::new(card, &self.env.modules, &self.env.project_root);
        let mut iters: Vec<IterState> = Vec::new();
        let mut pc = 0;
        while pc < self.code.len() {
            match &self.code[pc] {
                Instr::Literal(s) => em.write_literal(s),
                Instr::Emit(e) => ctx.emit(e, false, &mut em)?,
                Instr::EmitRaw(e) => ctx.emit(e, true, &mut em)?,
                Instr::AttrBegin { name, prefix } => em.begin_attribute(name, prefix)?,
                Instr::AttrLiteral(s) => em.attribute_chunk(s, true)?,
                Instr::AttrEmit { expr, raw } => ctx.emit_attr(expr, *raw, &mut em)?,
                Instr::AttrEnd { suffix } => em.end_attribute(suffix)?,
                Instr::JumpIfFalse { cond, target } => {
                    if !ctx.truthy(cond)? {
                        pc = *target;
                        continue;
                    }
                }
                Instr::Jump(target) => {
                    pc = *target;
                    continue;
                }
                Instr::IterStart { var, seq, exit } => {
                    let items = ctx.iterate(seq)?;
                    match items.first() {
                        Some(first) => {
                            ctx.push_var(var, Value::Node(first.clone()));
                            iters.push(IterState { items, index: 0 });
                        }
                        None => {
                            pc = *exit;
                            continue;
                        }
                    }
                }
                Instr::IterNext { body } => {
                    // iter stack mirrors IterStart nesting exactly
                    if let Some(state) = iters.last_mut() {
                        state.index += 1;
                        if let Some(item) = state.items.get(state.index) {
                            ctx.set_top(Value::Node(item.clone()));
                            pc = *body;
                            continue;
                        }
                        iters.pop();
                        ctx.pop_var();
                    }
                }
            }
            pc += 1;
        }
        Ok(em.finish())
    }

    fn listing(&self) -> &str {
        &self.listing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::BuiltinResolver;
    use cardsmith_record::parse_record;
    use std::path::Path;

    fn compile(src: &str) -> Box<dyn TemplateUnit> {
        crate::compile_template(src, Path::new("/proj"), &BuiltinResolver, &InstructionBackend)
            .unwrap()
    }

    fn run(src: &str, card: &str) -> String {
        compile(src).execute(&parse_record(card).unwrap()).unwrap()
    }

    #[test]
    fn branch_lowering_executes_one_arm() {
        let src = "@if(Data.A)yes@else no@endif";
        assert_eq!(run(src, r#"<C A="1"/>"#), "yes");
        assert_eq!(run(src, "<C/>"), " no");
    }

    #[test]
    fn empty_sequence_skips_the_body() {
        assert_eq!(run(r#"a@for(n in Data["N"])X@endfor b"#, "<C/>"), "a b");
    }

    #[test]
    fn nested_loops_unwind_in_order() {
        let src = r#"@for(r in Data["R"])@for(c in r["C"])(@r.Id,@c.text())@endfor;@endfor"#;
        let card = r#"<G>
            <R Id="1"><C>a</C><C>b</C></R>
            <R Id="2"><C>c</C></R>
        </G>"#;
        assert_eq!(run(src, card), "(1,a)(1,b);(2,c);");
    }

    #[test]
    fn loop_over_empty_then_content_after() {
        let src = r#"@for(n in Data["N"])@n.text()@endfor@if(Data.Tail)t@endif"#;
        assert_eq!(run(src, r#"<C Tail="1"/>"#), "t");
    }

    #[test]
    fn listing_is_numbered_with_jump_targets() {
        let unit = compile("@if(Data.A)x@else y@endif");
        let l = unit.listing();
        assert!(l.starts_with("0000  jump.false  Data.A -> "), "{l}");
        assert!(l.contains("0001  literal     \"x\""), "{l}");
        assert!(l.contains("0002  jump        -> "), "{l}");
        assert!(l.contains("0003  literal     \" y\""), "{l}");
    }

    #[test]
    fn loop_listing_round_trips_targets() {
        let unit = compile(r#"@for(n in Data["N"])x@endfor"#);
        let l = unit.listing();
        assert!(l.contains("0000  iter.start  n in Data[\"N\"] -> 0003"), "{l}");
        assert!(l.contains("0001  literal     \"x\""), "{l}");
        assert!(l.contains("0002  iter.next   -> 0001"), "{l}");
    }

    #[test]
    fn attribute_protocol_lowered_flat() {
        let out = run(r#"<Img Source="art/@(Data.Id).png"/>"#, r#"<C Id="7"/>"#);
        assert_eq!(out, r#"<Img Source="art/7.png"/>"#);
    }
}
