use std::rc::Rc;

use crate::value::Value;

/// A code module templates can call through a reference comment,
/// `<!-- reference name -->`. Calls are late-bound: the function name
/// and arguments are checked by the module itself at execution time.
pub trait TemplateModule {
    fn name(&self) -> &str;
    fn call(&self, func: &str, args: &[Value]) -> Result<Value, String>;
}

/// Resolves reference names to modules at compile time. An unresolved
/// name is a compile error, so a template never executes with a dangling
/// reference.
pub trait ModuleResolver {
    fn resolve(&self, name: &str) -> Option<Rc<dyn TemplateModule>>;
}

/// The modules one compiled template may call, keyed by reference name.
#[derive(Default, Clone)]
pub struct ModuleSet {
    entries: Vec<(String, Rc<dyn TemplateModule>)>,
}

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, module: Rc<dyn TemplateModule>) {
        self.entries.push((name.to_string(), module));
    }

    pub fn get(&self, name: &str) -> Option<&dyn TemplateModule> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m.as_ref())
    }
}

// ── Resolvers ─────────────────────────────────────────────────────────────

/// Resolves the built-in modules every project gets without any setup.
/// Currently that is `text`, a small string-manipulation helper.
#[derive(Default)]
pub struct BuiltinResolver;

impl ModuleResolver for BuiltinResolver {
    fn resolve(&self, name: &str) -> Option<Rc<dyn TemplateModule>> {
        match name {
            "text" => Some(Rc::new(TextModule)),
            _ => None,
        }
    }
}

/// A fixed set of modules, for hosts that register their own. Falls back
/// to the builtins for names it does not carry.
#[derive(Default)]
pub struct MemoryResolver {
    modules: Vec<Rc<dyn TemplateModule>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Rc<dyn TemplateModule>) {
        self.modules.push(module);
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Option<Rc<dyn TemplateModule>> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .cloned()
            .or_else(|| BuiltinResolver.resolve(name))
    }
}

/// Resolves nothing. Useful in tests that want reference comments to
/// fail compilation.
pub struct NullResolver;

impl ModuleResolver for NullResolver {
    fn resolve(&self, _name: &str) -> Option<Rc<dyn TemplateModule>> {
        None
    }
}

// ── Builtin text module ───────────────────────────────────────────────────

struct TextModule;

impl TemplateModule for TextModule {
    fn name(&self) -> &str {
        "text"
    }

    fn call(&self, func: &str, args: &[Value]) -> Result<Value, String> {
        match func {
            "upper" => Ok(Value::Text(text_arg(args, 0, func, 1)?.to_uppercase())),
            "lower" => Ok(Value::Text(text_arg(args, 0, func, 1)?.to_lowercase())),
            "trim" => Ok(Value::Text(text_arg(args, 0, func, 1)?.trim().to_string())),
            "replace" => {
                let s = text_arg(args, 0, func, 3)?;
                let from = text_arg(args, 1, func, 3)?;
                let to = text_arg(args, 2, func, 3)?;
                Ok(Value::Text(s.replace(&from, &to)))
            }
            "pad_left" => {
                let s = text_arg(args, 0, func, 3)?;
                let width = num_arg(args, 1, func, 3)? as usize;
                let fill = text_arg(args, 2, func, 3)?;
                let mut fill_chars = fill.chars();
                let (Some(fill), None) = (fill_chars.next(), fill_chars.next()) else {
                    return Err(format!("{func} needs a single fill character"));
                };
                let have = s.chars().count();
                let mut out = String::new();
                for _ in have..width {
                    out.push(fill);
                }
                out.push_str(&s);
                Ok(Value::Text(out))
            }
            _ => Err(format!("unknown function '{func}'")),
        }
    }
}

fn text_arg(args: &[Value], i: usize, func: &str, want: usize) -> Result<String, String> {
    match args.get(i) {
        Some(v) => v.render(),
        None => Err(format!("{func} expects {want} argument{}", plural(want))),
    }
}

fn num_arg(args: &[Value], i: usize, func: &str, want: usize) -> Result<f64, String> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(*n),
        Some(Value::Text(s)) => {
            s.parse().map_err(|_| format!("{func}: '{s}' is not a number"))
        }
        Some(v) => Err(format!("{func}: expected a number, got {}", v.kind())),
        None => Err(format!("{func} expects {want} argument{}", plural(want))),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
