use std::path::Path;

use cardsmith_record::Record;

use crate::emit::Emitter;
use crate::error::ExecError;
use crate::expr::{Expr, Step};
use crate::modules::ModuleSet;
use crate::value::Value;

/// Evaluation context for one execution: the card record bound to
/// `Data`, the loop-variable scope, the template's resolved modules,
/// and the project root for the `path()` builtin.
pub(crate) struct EvalCtx<'a> {
    data: &'a Record,
    scope: Vec<(String, Value)>,
    modules: &'a ModuleSet,
    project_root: &'a Path,
}

impl<'a> EvalCtx<'a> {
    pub fn new(data: &'a Record, modules: &'a ModuleSet, project_root: &'a Path) -> Self {
        Self { data, scope: Vec::new(), modules, project_root }
    }

    pub fn push_var(&mut self, name: &str, value: Value) {
        self.scope.push((name.to_string(), value));
    }

    pub fn pop_var(&mut self) {
        self.scope.pop();
    }

    /// Rebinds the innermost variable, used when a loop advances.
    pub fn set_top(&mut self, value: Value) {
        if let Some(slot) = self.scope.last_mut() {
            slot.1 = value;
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some((_, v)) = self.scope.iter().rev().find(|(n, _)| n == name) {
            return Some(v.clone());
        }
        (name == "Data").then(|| Value::Node(self.data.clone()))
    }

    pub fn eval(&self, e: &Expr) -> Result<Value, ExecError> {
        match e {
            Expr::Str(s) => Ok(Value::Text(s.clone())),
            Expr::Num(n) => Ok(Value::Number(*n)),
            Expr::Path { root, steps, pos } => {
                let mut v = self
                    .lookup(root)
                    .ok_or_else(|| ExecError::at(format!("unbound variable '{root}'"), *pos))?;
                for step in steps {
                    // absence absorbs the rest of the path
                    if matches!(v, Value::Absent) {
                        return Ok(Value::Absent);
                    }
                    v = apply_step(v, step)
                        .map_err(|msg| ExecError::at(format!("{msg} (in '{e}')"), *pos))?;
                }
                Ok(v)
            }
            Expr::ModuleCall { module, func, args, pos } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a)?);
                }
                let m = self.modules.get(module).ok_or_else(|| {
                    ExecError::at(format!("module '{module}' is not available"), *pos)
                })?;
                m.call(func, &values)
                    .map_err(|msg| ExecError::at(format!("module '{module}': {msg}"), *pos))
            }
            Expr::ProjectPath { arg, .. } => {
                let rel = self.render(arg)?;
                let joined = self.project_root.join(rel);
                Ok(Value::Text(joined.display().to_string()))
            }
            Expr::Not(inner, _) => Ok(Value::Bool(!self.eval(inner)?.truthy())),
            Expr::Compare { lhs, rhs, negate, .. } => {
                let l = self.render(lhs)?;
                let r = self.render(rhs)?;
                Ok(Value::Bool((l == r) != *negate))
            }
        }
    }

    pub fn truthy(&self, e: &Expr) -> Result<bool, ExecError> {
        Ok(self.eval(e)?.truthy())
    }

    fn render(&self, e: &Expr) -> Result<String, ExecError> {
        self.eval(e)?.render().map_err(|msg| err_at(e, msg))
    }

    /// Evaluates and writes to the main buffer.
    pub fn emit(&self, e: &Expr, raw: bool, em: &mut Emitter) -> Result<(), ExecError> {
        let text = self.render(e)?;
        if raw {
            em.write_literal(&text);
        } else {
            em.write_escaped(&text);
        }
        Ok(())
    }

    /// Evaluates and writes as a fragment of the open attribute value.
    pub fn emit_attr(&self, e: &Expr, raw: bool, em: &mut Emitter) -> Result<(), ExecError> {
        let text = self.render(e)?;
        em.attribute_chunk(&text, raw)
    }

    /// Evaluates a `@for` sequence. Only a node sequence iterates;
    /// anything else, including a lone node, is an execution error.
    pub fn iterate(&self, e: &Expr) -> Result<Vec<Record>, ExecError> {
        match self.eval(e)? {
            Value::Nodes(v) => Ok(v),
            v => Err(err_at(e, format!("cannot iterate {} (in '{e}')", v.kind()))),
        }
    }
}

fn err_at(e: &Expr, msg: String) -> ExecError {
    match e.pos() {
        Some(pos) => ExecError::at(msg, pos),
        None => ExecError::new(msg),
    }
}

fn apply_step(v: Value, step: &Step) -> Result<Value, String> {
    match step {
        Step::Attr(name) => match v {
            Value::Node(r) => Ok(r
                .attribute(name)
                .map(|s| Value::Text(s.to_string()))
                .unwrap_or(Value::Absent)),
            other => Err(format!("cannot access '.{name}' on {}", other.kind())),
        },
        Step::Child(i) => match v {
            Value::Node(r) => Ok(r.child(*i).map(Value::Node).unwrap_or(Value::Absent)),
            Value::Nodes(v) => Ok(v.get(*i).cloned().map(Value::Node).unwrap_or(Value::Absent)),
            other => Err(format!("cannot index {}", other.kind())),
        },
        Step::ChildrenNamed(name) => match v {
            Value::Node(r) => Ok(Value::Nodes(r.children_named(name).collect())),
            other => Err(format!("cannot select children of {}", other.kind())),
        },
        Step::ChildNamed(name, i) => match v {
            Value::Node(r) => {
                Ok(r.child_named(name, *i).map(Value::Node).unwrap_or(Value::Absent))
            }
            other => Err(format!("cannot select children of {}", other.kind())),
        },
        Step::Text => match v {
            Value::Node(r) => Ok(Value::Text(r.text())),
            other => Err(format!("text() needs a node, got {}", other.kind())),
        },
        Step::Xml => match v {
            Value::Node(r) => Ok(Value::Text(r.raw_markup())),
            other => Err(format!("xml() needs a node, got {}", other.kind())),
        },
        Step::NodeName => match v {
            Value::Node(r) => Ok(Value::Text(r.name().to_string())),
            other => Err(format!("name() needs a node, got {}", other.kind())),
        },
        Step::Count => match v {
            Value::Nodes(v) => Ok(Value::Number(v.len() as f64)),
            other => Err(format!("count() needs a node sequence, got {}", other.kind())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Pos;
    use cardsmith_record::parse_record;

    fn card() -> Record {
        parse_record(
            r#"<Card Id="7" Rarity="gold">
                 <Note>first</Note>
                 <Note>second</Note>
                 <Art File="a.png"/>
               </Card>"#,
        )
        .unwrap()
    }

    fn path(root: &str, steps: Vec<Step>) -> Expr {
        Expr::Path { root: root.into(), steps, pos: Pos::START }
    }

    fn eval_on(card: &Record, e: &Expr) -> Result<Value, ExecError> {
        let modules = ModuleSet::new();
        let ctx = EvalCtx::new(card, &modules, Path::new("/proj"));
        ctx.eval(e)
    }

    #[test]
    fn attribute_lookup() {
        let c = card();
        let v = eval_on(&c, &path("Data", vec![Step::Attr("Id".into())])).unwrap();
        assert_eq!(v, Value::Text("7".into()));
        let v = eval_on(&c, &path("Data", vec![Step::Attr("Missing".into())])).unwrap();
        assert_eq!(v, Value::Absent);
    }

    #[test]
    fn absence_absorbs_later_steps() {
        let c = card();
        let v = eval_on(
            &c,
            &path("Data", vec![Step::Attr("Missing".into()), Step::Text, Step::Count]),
        )
        .unwrap();
        assert_eq!(v, Value::Absent);
    }

    #[test]
    fn child_selection() {
        let c = card();
        let v = eval_on(
            &c,
            &path("Data", vec![Step::ChildNamed("Note".into(), 1), Step::Text]),
        )
        .unwrap();
        assert_eq!(v, Value::Text("second".into()));

        let v = eval_on(&c, &path("Data", vec![Step::ChildrenNamed("Note".into()), Step::Count]))
            .unwrap();
        assert_eq!(v, Value::Number(2.0));

        let v = eval_on(&c, &path("Data", vec![Step::Child(2), Step::NodeName])).unwrap();
        assert_eq!(v, Value::Text("Art".into()));
    }

    #[test]
    fn index_into_sequence() {
        let c = card();
        let v = eval_on(
            &c,
            &path(
                "Data",
                vec![Step::ChildrenNamed("Note".into()), Step::Child(0), Step::Text],
            ),
        )
        .unwrap();
        assert_eq!(v, Value::Text("first".into()));
    }

    #[test]
    fn step_errors_name_the_path() {
        let c = card();
        let err = eval_on(
            &c,
            &path("Data", vec![Step::Attr("Id".into()), Step::Attr("X".into())]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot access '.X' on text"));
        assert!(err.to_string().contains("Data.Id.X"));
    }

    #[test]
    fn compare_and_not() {
        let c = card();
        let e = Expr::Compare {
            lhs: Box::new(path("Data", vec![Step::Attr("Rarity".into())])),
            rhs: Box::new(Expr::Str("gold".into())),
            negate: false,
            pos: Pos::START,
        };
        assert_eq!(eval_on(&c, &e).unwrap(), Value::Bool(true));

        let e = Expr::Not(Box::new(path("Data", vec![Step::Attr("Missing".into())])), Pos::START);
        assert_eq!(eval_on(&c, &e).unwrap(), Value::Bool(true));
    }

    #[test]
    fn project_path_joins_root() {
        let c = card();
        let e = Expr::ProjectPath { arg: Box::new(Expr::Str("art/x.png".into())), pos: Pos::START };
        let v = eval_on(&c, &e).unwrap();
        let Value::Text(p) = v else { panic!() };
        assert!(p.ends_with("art/x.png"), "{p}");
        assert!(p.starts_with("/proj"), "{p}");
    }

    #[test]
    fn iterate_requires_a_sequence() {
        let c = card();
        let modules = ModuleSet::new();
        let ctx = EvalCtx::new(&c, &modules, Path::new("/proj"));
        let seq = path("Data", vec![Step::ChildrenNamed("Note".into())]);
        assert_eq!(ctx.iterate(&seq).unwrap().len(), 2);

        let lone = path("Data", vec![]);
        let err = ctx.iterate(&lone).unwrap_err();
        assert!(err.to_string().contains("cannot iterate node"));

        let absent = path("Data", vec![Step::Attr("Missing".into())]);
        assert!(ctx.iterate(&absent).is_err());
    }

    #[test]
    fn loop_variable_shadows() {
        let c = card();
        let modules = ModuleSet::new();
        let mut ctx = EvalCtx::new(&c, &modules, Path::new("/proj"));
        ctx.push_var("item", Value::Text("inner".into()));
        let v = ctx.eval(&path("item", vec![])).unwrap();
        assert_eq!(v, Value::Text("inner".into()));
        ctx.pop_var();
        assert!(ctx.eval(&path("item", vec![])).is_err());
    }
}
