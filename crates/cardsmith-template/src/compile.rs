use std::path::{Path, PathBuf};

use cardsmith_record::Record;

use crate::error::{CompileError, Diagnostic, ExecError};
use crate::lexer::scan_references;
use crate::modules::{ModuleResolver, ModuleSet};
use crate::parser::parse_template;
use crate::program::Program;

/// A compiled template, ready to execute once per card. Compilation is a
/// pure function of source text and reference set, so one unit is reused
/// across every card of a generation run; execution itself keeps no state
/// between calls.
pub trait TemplateUnit {
    /// Produces the generated markup for one card record.
    fn execute(&self, card: &Record) -> Result<String, ExecError>;

    /// Human-readable listing of the compiled form, written next to the
    /// generated markup as a debugging artifact.
    fn listing(&self) -> &str;
}

impl std::fmt::Debug for dyn TemplateUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateUnit").finish_non_exhaustive()
    }
}

/// Turns a parsed program into an executable unit. Two backends exist:
/// the instruction backend used in production and a tree-walking one
/// kept as a cross-check in tests.
pub trait Backend {
    fn compile(&self, program: Program, env: UnitEnv) -> Box<dyn TemplateUnit>;
}

/// Everything an executing unit needs besides the card itself.
pub struct UnitEnv {
    pub(crate) modules: ModuleSet,
    pub(crate) project_root: PathBuf,
}

/// Compiles template source: scans reference comments, resolves them
/// against `resolver`, parses, and hands the program to `backend`.
/// All compile-stage problems are reported together.
pub fn compile_template(
    source: &str,
    project_root: &Path,
    resolver: &dyn ModuleResolver,
    backend: &dyn Backend,
) -> Result<Box<dyn TemplateUnit>, CompileError> {
    let refs = scan_references(source);
    let mut diagnostics = Vec::new();
    let mut modules = ModuleSet::new();
    for (name, pos) in &refs {
        match resolver.resolve(name) {
            Some(m) => modules.insert(name, m),
            None => diagnostics.push(Diagnostic::error(
                format!("unresolved module reference '{name}'"),
                *pos,
            )),
        }
    }
    let names: Vec<String> = refs.into_iter().map(|(n, _)| n).collect();
    let program = match parse_template(source, &names) {
        Ok(p) => p,
        Err(e) => {
            diagnostics.extend(e.diagnostics);
            return Err(CompileError::new(diagnostics));
        }
    };
    if !diagnostics.is_empty() {
        return Err(CompileError::new(diagnostics));
    }
    Ok(backend.compile(program, UnitEnv { modules, project_root: project_root.to_path_buf() }))
}
