//! Error types for compiling and rendering templates.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// A syntax error inside an embedded script fragment (an expression or an
/// injected statement). Offsets are byte offsets into that fragment.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
    pub len: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize, len: usize) -> Self {
        Self {
            message: message.into(),
            offset,
            len,
        }
    }
}

/// The synthesized program failed to load: one of the parts carries
/// invalid script.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error} in `{fragment}`")]
pub struct LoadError {
    /// Text of the offending part.
    pub fragment: String,
    pub error: SyntaxError,
}

/// Compilation failed and no template was produced.
#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    #[error("invalid script in template `{label}`: {message}")]
    #[diagnostic(
        code(fastjade::compile::script),
        help("expressions and `-` lines use a JavaScript-like syntax")
    )]
    Script {
        label: String,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },
}

impl CompileError {
    pub(crate) fn from_load(label: &str, err: LoadError) -> Self {
        let span = SourceSpan::from((err.error.offset, err.error.len));
        CompileError::Script {
            label: label.to_string(),
            message: err.error.message,
            src: NamedSource::new(label, err.fragment),
            span,
        }
    }
}

/// A core invariant was violated; never caused by template input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("internal error: {0}")]
pub struct InternalError(pub String);

/// Rendering a compiled template failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("error in function `{name}`: {message}")]
    Function { name: String, message: String },

    /// The program referred to something the compiler never produced.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl RenderError {
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Function {
            name: name.into(),
            message: message.into(),
        }
    }
}
