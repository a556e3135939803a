//! The run-level error taxonomy and the human-readable report format.
//!
//! Every variant aborts the run (fail-fast). `Display` is a single line
//! suitable for logs; [`GenError::report`] renders the full report with the
//! carried source text numbered per line, followed by a `Diagnostics:` or
//! `Exception:` section where one applies.

use cardsmith_record::ParseError;
use cardsmith_render::RenderError;
use cardsmith_template::{CompileError, ExecError};
use thiserror::Error;

/// What went wrong inside a deck's data, wrapped by
/// [`GenError::DataParsing`].
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Xml(#[from] ParseError),
    /// A `Dpi`/`Width`/`Height` default or override that does not parse.
    #[error("attribute {name} has invalid value '{value}'")]
    Attribute { name: String, value: String },
}

#[derive(Debug, Error)]
pub enum GenError {
    /// Deck XML is malformed, or a numeric default attribute is unparsable.
    #[error("Data parsing error for {deck}.")]
    DataParsing {
        deck: String,
        /// The raw deck source, for the report's `Code:` section.
        code: String,
        #[source]
        cause: DataError,
    },

    /// The requested template does not exist; an unspecified template
    /// reports the same way with an empty name.
    #[error("Cannot find template {template} referenced in {deck}")]
    TemplateNotFound { deck: String, template: String },

    #[error("Compilation error for {template}.")]
    Compilation {
        template: String,
        /// The template source text.
        code: String,
        #[source]
        cause: CompileError,
    },

    /// The compiled unit raised while executing against a card.
    #[error("Template execution error for {deck}/{card}.")]
    Execution {
        deck: String,
        card: String,
        /// The unit's compiled listing.
        code: String,
        #[source]
        cause: ExecError,
    },

    /// The produced markup could not be parsed, laid out, or rasterized.
    #[error("Card image generation error for {deck}/{card}.")]
    Render {
        deck: String,
        card: String,
        /// The markup the unit produced.
        code: String,
        #[source]
        cause: RenderError,
    },

    /// A card with no `Id` attribute, found before its template ran.
    #[error("Card {index} in {deck} has no Id")]
    MissingId { deck: String, index: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The cancel flag stopped the run at a card boundary.
    #[error("generation cancelled")]
    Cancelled,
}

impl GenError {
    /// Renders the full report: the message, then the carried source under
    /// `Code:` with `0001 `-style line numbers, then diagnostics or the
    /// causing exception.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.to_string());
        out.push('\n');
        match self {
            Self::DataParsing { code, cause, .. } => {
                push_code(&mut out, code);
                out.push('\n');
                out.push_str(&cause.to_string());
                out.push('\n');
            }
            Self::Compilation { code, cause, .. } => {
                push_code(&mut out, code);
                out.push_str("\nDiagnostics:\n");
                for d in &cause.diagnostics {
                    out.push('\n');
                    out.push_str(&d.to_string());
                    out.push('\n');
                }
            }
            Self::Execution { code, cause, .. } => {
                push_code(&mut out, code);
                push_exception(&mut out, &cause.to_string());
            }
            Self::Render { code, cause, .. } => {
                push_code(&mut out, code);
                push_exception(&mut out, &cause.to_string());
            }
            Self::TemplateNotFound { .. }
            | Self::MissingId { .. }
            | Self::Io(_)
            | Self::Cancelled => {}
        }
        out
    }
}

fn push_code(out: &mut String, code: &str) {
    out.push_str("\nCode:\n\n");
    for (i, line) in code.lines().enumerate() {
        out.push_str(&format!("{:04} {line}\n", i + 1));
    }
}

fn push_exception(out: &mut String, cause: &str) {
    out.push_str("\nException:\n\n");
    out.push_str(cause);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsmith_template::{Diagnostic, Pos};

    #[test]
    fn compilation_report_numbers_the_source() {
        let err = GenError::Compilation {
            template: "Unit".into(),
            code: "line one\nline two".into(),
            cause: CompileError::new(vec![
                Diagnostic::error("unknown name 'Foo'", Pos::new(2, 3)),
                Diagnostic::error("unexpected '@'", Pos::new(1, 1)),
            ]),
        };
        assert_eq!(
            err.report(),
            "Compilation error for Unit.\n\
             \n\
             Code:\n\
             \n\
             0001 line one\n\
             0002 line two\n\
             \n\
             Diagnostics:\n\
             \n\
             error at 2:3: unknown name 'Foo'\n\
             \n\
             error at 1:1: unexpected '@'\n"
        );
    }

    #[test]
    fn execution_report_has_an_exception_section() {
        let err = GenError::Execution {
            deck: "Heroes".into(),
            card: "7".into(),
            code: "0000  literal     \"x\"".into(),
            cause: ExecError::at("cannot write a node sequence; index it or iterate with @for", Pos::new(3, 2)),
        };
        let report = err.report();
        assert!(report.starts_with("Template execution error for Heroes/7.\n"));
        assert!(report.contains("\nCode:\n\n0001 0000  literal     \"x\"\n"));
        assert!(report.contains("\nException:\n\ntemplate execution error at 3:2:"));
    }

    #[test]
    fn template_not_found_is_message_only() {
        let err = GenError::TemplateNotFound { deck: "Heroes".into(), template: "Unit".into() };
        assert_eq!(err.to_string(), "Cannot find template Unit referenced in Heroes");
        assert_eq!(err.report(), "Cannot find template Unit referenced in Heroes\n");
    }

    #[test]
    fn missing_template_name_reports_empty() {
        let err = GenError::TemplateNotFound { deck: "Heroes".into(), template: String::new() };
        assert_eq!(err.to_string(), "Cannot find template  referenced in Heroes");
    }

    #[test]
    fn data_parsing_report_carries_the_cause_line() {
        let err = GenError::DataParsing {
            deck: "Heroes".into(),
            code: "<Deck Dpi=\"abc\"/>".into(),
            cause: DataError::Attribute { name: "Dpi".into(), value: "abc".into() },
        };
        let report = err.report();
        assert!(report.contains("0001 <Deck Dpi=\"abc\"/>\n"));
        assert!(report.ends_with("attribute Dpi has invalid value 'abc'\n"));
    }

    #[test]
    fn io_errors_wrap_transparently() {
        let err: GenError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("i/o error:"));
        assert_eq!(err.report(), format!("{err}\n"));
    }
}
