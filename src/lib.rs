//! fastjade: an indentation-based HTML template compiler in the style of
//! Jade/Pug.
//!
//! A template is compiled once into a [`Template`] and rendered any number
//! of times against a [`Context`]. Compilation runs four stages:
//!
//! - [`parser`] turns source lines into a node tree, using [`header`] for
//!   each element line's `tag#id.class(attrs)` prefix.
//! - [`linearize`] flattens the tree into literal text, escaped and raw
//!   expressions, and injected statements.
//! - [`synth`] parses every script fragment and assembles a [`Program`].
//! - [`eval`] runs the program against a context.
//!
//! Syntax summary:
//! - `| text`, `= expr`, `!= expr`, `- statement`.
//! - `// comment` and `//- silent comment`.
//! - `doctype [keyword]`.
//! - `:javascript` and other registered filters.
//! - `tag#id.class(attr="v", attr=expr)` followed by `.`, `= expr`,
//!   `!= expr` or inline text.
//! - `#{expr}` / `!{expr}` inside text and quoted attribute values.
//!
//! Expressions and statements use a small JavaScript-like language; the
//! context's variables are in scope unqualified.
//!
//! Malformed lines never fail a compile. They are reported as
//! [`Warning`]s through a [`DiagnosticSink`] and replaced by a neutral
//! node. Only invalid script makes [`compile`] return an error.

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod filters;
pub mod header;
pub mod html;
pub mod lexer;
pub mod linearize;
pub mod parser;
pub mod script;
pub mod synth;
pub mod value;

use std::sync::Arc;

use tracing::{debug, trace};

pub use ast::{Node, Part};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink, Warning, WarningKind};
pub use error::{CompileError, InternalError, LoadError, RenderError};
pub use filters::Filters;
pub use synth::Program;
pub use value::{Context, Value};

/// Label used in diagnostics when the caller gives none.
pub const DEFAULT_LABEL: &str = "template";

/// Compile `source` with the built-in filters.
///
/// Warnings are logged through `tracing` and kept on the returned template.
pub fn compile(source: &str, label: Option<&str>) -> Result<Template, CompileError> {
    Compiler::new().compile(source, label)
}

/// Render a compiled template.
pub fn render(template: &Template, context: &Context) -> Result<String, RenderError> {
    template.render(context)
}

/// Reusable compiler front end holding the filter registry.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    filters: Filters,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `:name` filter, replacing any existing one.
    pub fn with_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&str) -> Node + Send + Sync + 'static,
    {
        self.filters.register(name, filter);
        self
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn compile(&self, source: &str, label: Option<&str>) -> Result<Template, CompileError> {
        self.compile_with_sink(source, label, &mut TracingSink)
    }

    /// Compile, reporting every diagnostic to `sink`.
    ///
    /// # Panics
    ///
    /// Panics when the parsed tree violates the linearizer's invariants.
    /// This is a bug in the compiler and cannot be caused by template input;
    /// the sink receives a [`Diagnostic::Internal`] first.
    pub fn compile_with_sink(
        &self,
        source: &str,
        label: Option<&str>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Template, CompileError> {
        let label = label.unwrap_or(DEFAULT_LABEL);
        let parsed = parser::Parser::new(source, &self.filters).parse();
        for warning in &parsed.warnings {
            sink.report(label, Diagnostic::Warning(warning.clone()));
        }

        let parts = match linearize::linearize(&parsed.root) {
            Ok(parts) => parts,
            Err(err) => {
                sink.report(label, Diagnostic::Internal(err.0.clone()));
                panic!("{err} while compiling `{label}`");
            }
        };

        let program = synth::synthesize(&parts).map_err(|err| {
            sink.report(label, Diagnostic::ParseError(err.to_string()));
            CompileError::from_load(label, err)
        })?;

        debug!(
            label,
            parts = parts.len(),
            warnings = parsed.warnings.len(),
            "compiled template"
        );
        Ok(Template {
            inner: Arc::new(Compiled {
                label: label.to_string(),
                parts,
                program,
                warnings: parsed.warnings,
            }),
        })
    }
}

#[derive(Debug)]
struct Compiled {
    label: String,
    parts: Vec<Part>,
    program: Program,
    warnings: Vec<Warning>,
}

/// A compiled template. Cheap to clone and safe to render from many
/// threads at once.
#[derive(Debug, Clone)]
pub struct Template {
    inner: Arc<Compiled>,
}

impl Template {
    pub fn render(&self, context: &Context) -> Result<String, RenderError> {
        let output = eval::render(&self.inner.program, context)?;
        trace!(label = %self.inner.label, bytes = output.len(), "rendered template");
        Ok(output)
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Warnings reported while compiling.
    pub fn warnings(&self) -> &[Warning] {
        &self.inner.warnings
    }

    pub fn parts(&self) -> &[Part] {
        &self.inner.parts
    }

    /// JavaScript-style listing of the template function.
    pub fn function_source(&self) -> String {
        synth::function_source(&self.inner.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_render() {
        let template = compile("p Hello #{name}!", Some("greeting")).unwrap();
        let ctx = Context::new().with_var("name", "<World>");
        assert_eq!(template.render(&ctx).unwrap(), "<p>Hello &lt;World&gt;!</p>");
        assert_eq!(template.label(), "greeting");
    }

    #[test]
    fn warnings_reach_the_sink_and_the_template() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        let template = Compiler::new()
            .compile_with_sink("include other\np ok", None, &mut sink)
            .unwrap();
        assert_eq!(template.warnings().len(), 1);
        assert!(matches!(
            &sink[..],
            [Diagnostic::Warning(Warning { kind: WarningKind::UnsupportedInclude, line: 1, .. })]
        ));
        assert_eq!(template.render(&Context::new()).unwrap(), "<p>ok</p>");
    }

    #[test]
    fn invalid_script_is_a_compile_error() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        let err = Compiler::new()
            .compile_with_sink("p= a +", Some("bad"), &mut sink)
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid script in template `bad`"));
        assert!(matches!(&sink[..], [Diagnostic::ParseError(_)]));
    }

    #[test]
    fn custom_filter() {
        let compiler = Compiler::new().with_filter("upper", |block| Node::text(block.to_uppercase()));
        let template = compiler.compile(":upper\n  shout", None).unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "SHOUT");
    }

    #[test]
    fn function_source_lists_parts() {
        let template = compile("p= x", None).unwrap();
        let src = template.function_source();
        assert!(src.starts_with("function anonymous(context) {"));
        assert!(src.contains("escapeHtml(x)"));
    }

    #[test]
    fn templates_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Template>();
    }
}
