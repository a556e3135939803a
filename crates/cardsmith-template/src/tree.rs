use cardsmith_record::Record;

use crate::compile::{Backend, TemplateUnit, UnitEnv};
use crate::emit::Emitter;
use crate::error::ExecError;
use crate::eval::EvalCtx;
use crate::program::{Op, Program};
use crate::value::Value;

/// Executes the op tree directly by recursion. Slower than the
/// instruction backend but trivially correct; tests run both and compare
/// output byte for byte.
pub struct TreeBackend;

impl Backend for TreeBackend {
    fn compile(&self, program: Program, env: UnitEnv) -> Box<dyn TemplateUnit> {
        let listing = program.dump();
        Box::new(TreeUnit { program, env, listing })
    }
}

struct TreeUnit {
    program: Program,
    env: UnitEnv,
    listing: String,
}

impl TemplateUnit for TreeUnit {
    fn execute(&self, card: &Record) -> Result<String, ExecError> {
        let mut em = Emitter::new();
        let mut ctx = EvalCtx::new(card, &self.env.modules, &self.env.project_root);
        exec_ops(&self.program.ops, &mut ctx, &mut em)?;
        Ok(em.finish())
    }

    fn listing(&self) -> &str {
        &self.listing
    }
}

fn exec_ops(ops: &[Op], ctx: &mut EvalCtx<'_>, em: &mut Emitter) -> Result<(), ExecError> {
    for op in ops {
        match op {
            Op::Literal(s) => em.write_literal(s),
            Op::Emit(e) => ctx.emit(e, false, em)?,
            Op::EmitRaw(e) => ctx.emit(e, true, em)?,
            Op::AttrBegin { name, prefix } => em.begin_attribute(name, prefix)?,
            Op::AttrLiteral(s) => em.attribute_chunk(s, true)?,
            Op::AttrEmit { expr, raw } => ctx.emit_attr(expr, *raw, em)?,
            Op::AttrEnd { suffix } => em.end_attribute(suffix)?,
            Op::If { cond, then_ops, else_ops, .. } => {
                if ctx.truthy(cond)? {
                    exec_ops(then_ops, ctx, em)?;
                } else {
                    exec_ops(else_ops, ctx, em)?;
                }
            }
            Op::For { var, seq, body, .. } => {
                let items = ctx.iterate(seq)?;
                ctx.push_var(var, Value::Absent);
                for item in items {
                    ctx.set_top(Value::Node(item));
                    if let Err(e) = exec_ops(body, ctx, em) {
                        ctx.pop_var();
                        return Err(e);
                    }
                }
                ctx.pop_var();
            }
        }
    }
    Ok(())
}
