//! Compile-time diagnostics.
//!
//! The compiler never aborts on a malformed line. It records a [`Warning`],
//! substitutes a neutral node and keeps going. Warnings, load failures and
//! internal errors all flow through a [`DiagnosticSink`]; the default sink
//! forwards them to `tracing`.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    #[error("malformed attribute list: {0}")]
    MalformedAttributes(String),

    #[error("unknown filter `:{0}`, its block is discarded")]
    UnknownFilter(String),

    #[error("`include` is not supported")]
    UnsupportedInclude,

    #[error("`extends` is not supported")]
    UnsupportedExtends,

    #[error("`{0}` is a void element and cannot have children")]
    VoidElementChildren(String),

    #[error("text cannot have nested children")]
    TextChildren,

    #[error("nested deeper than {0} levels, the block is discarded")]
    NestingTooDeep(usize),
}

/// A recoverable, line-level problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// 1-based line number.
    pub line: usize,
    /// The offending line, as written.
    pub text: String,
    pub kind: WarningKind,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} (`{}`)", self.line, self.kind, self.text.trim())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Warning(Warning),
    /// The synthesized program failed to load.
    ParseError(String),
    /// A core invariant was violated.
    Internal(String),
}

pub trait DiagnosticSink {
    fn report(&mut self, label: &str, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, label: &str, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::Warning(w) => {
                tracing::warn!(label, line = w.line, text = %w.text.trim(), "{}", w.kind)
            }
            Diagnostic::ParseError(message) => tracing::error!(label, "{message}"),
            Diagnostic::Internal(message) => tracing::error!(label, "internal error: {message}"),
        }
    }
}

/// Collects diagnostics, mostly useful in tests.
impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, _label: &str, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}
