//! Template compilation and execution for card generation.
//!
//! A template is markup text with `@` directives. Compiling yields a
//! [`TemplateUnit`] that is executed once per card record, producing the
//! markup handed to the renderer. Compilation happens once per template
//! per generation run; execution is stateless between cards.
//!
//! The directive language:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `@@` | a literal `@` |
//! | `@Data.Name`, `@item[0].text()` | evaluate a path, write escaped |
//! | `@(expr)` | explicit expression, write escaped |
//! | `@raw(expr)` | write without escaping |
//! | `@if(cond)…@else…@endif` | conditional |
//! | `@for(var in seq)…@endfor` | iterate a child sequence |
//! | `<!-- reference name -->` | bind a code module for `name.func(..)` calls |
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`lexer`] | markup-aware segment lexer, `scan_references` |
//! | [`expr`] | expression syntax and resolved forms |
//! | [`parser`] | `parse_template`: segments to a program |
//! | [`program`] | `Program`, `Op` |
//! | [`compile`] | `compile_template`, `TemplateUnit`, `Backend` |
//! | [`instr`] | flat-instruction backend (production) |
//! | [`tree`] | tree-walking backend (cross-check) |
//! | [`value`] | runtime values and truthiness |
//! | [`emit`] | output buffer and the attribute protocol |
//! | [`modules`] | module references, builtin `text` module |
//! | [`error`] | positions, diagnostics, compile and execution errors |
//!
//! # Quick start
//!
//! ```rust
//! use cardsmith_record::parse_record;
//! use cardsmith_template::{compile_template, BuiltinResolver, InstructionBackend};
//! use std::path::Path;
//!
//! let unit = compile_template(
//!     r#"<Text Value="@Data.Name"/>"#,
//!     Path::new("."),
//!     &BuiltinResolver,
//!     &InstructionBackend,
//! )
//! .unwrap();
//! let card = parse_record(r#"<Card Id="1" Name="Aurora"/>"#).unwrap();
//! assert_eq!(unit.execute(&card).unwrap(), r#"<Text Value="Aurora"/>"#);
//! ```

pub mod compile;
pub mod emit;
pub mod error;
pub mod expr;
pub mod instr;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod program;
pub mod tree;
pub mod value;

mod eval;

pub use compile::{compile_template, Backend, TemplateUnit, UnitEnv};
pub use emit::Emitter;
pub use error::{CompileError, Diagnostic, ExecError, Pos, Severity};
pub use instr::InstructionBackend;
pub use lexer::scan_references;
pub use modules::{
    BuiltinResolver, MemoryResolver, ModuleResolver, ModuleSet, NullResolver, TemplateModule,
};
pub use parser::parse_template;
pub use tree::TreeBackend;
pub use value::Value;
