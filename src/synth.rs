//! Function synthesizer: part sequence to an executable [`Program`].
//!
//! Every script fragment is parsed here, once, so a malformed expression
//! fails the compile instead of the render. Output parts become numbered
//! slots; statement parts are tokenized into one stream with an
//! `Emit(slot)` marker wherever output happens, then parsed as a single
//! statement list. That lets a block opened in one `-` line close in a
//! later one with any amount of markup between them.

use crate::ast::{Output, Part, Stmt};
use crate::error::LoadError;
use crate::html::add_slashes;
use crate::lexer::{Token, Tokenizer};
use crate::script::{parse_expression, Lexeme, Parser};

/// A loaded template function.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub outputs: Vec<Output>,
}

fn fragment(part: &Part) -> &str {
    match part {
        Part::Literal(s) | Part::Escaped(s) | Part::Raw(s) | Part::Unguarded(s) | Part::Statement(s) => s,
    }
}

pub fn synthesize(parts: &[Part]) -> Result<Program, LoadError> {
    let mut lexemes = Vec::new();
    let mut outputs = Vec::new();

    for (index, part) in parts.iter().enumerate() {
        let load_error = |error| LoadError {
            fragment: fragment(part).to_string(),
            error,
        };
        let output = match part {
            Part::Statement(source) => {
                let tokens = Tokenizer::tokenize(source).map_err(load_error)?;
                lexemes.extend(tokens.into_iter().map(|t| Lexeme::from_spanned(t, index)));
                continue;
            }
            Part::Literal(text) => Output::Literal(text.clone()),
            Part::Escaped(expr) => Output::Escaped(parse_expression(expr).map_err(load_error)?),
            Part::Raw(expr) => Output::Raw(parse_expression(expr).map_err(load_error)?),
            Part::Unguarded(expr) => Output::Unguarded(parse_expression(expr).map_err(load_error)?),
        };
        lexemes.push(Lexeme {
            token: Token::Emit(outputs.len()),
            fragment: index,
            start: 0,
            end: 0,
        });
        outputs.push(output);
    }

    let body = Parser::new(lexemes)
        .parse_program()
        .map_err(|failure| LoadError {
            fragment: parts
                .get(failure.fragment)
                .map(fragment)
                .unwrap_or_default()
                .to_string(),
            error: failure.error,
        })?;
    tracing::trace!(statements = body.len(), outputs = outputs.len(), "synthesized program");
    Ok(Program { body, outputs })
}

/// The function listing the parts describe, in JavaScript form.
///
/// Informational only; rendering runs the [`Program`] built by
/// [`synthesize`].
pub fn function_source(parts: &[Part]) -> String {
    let mut src = String::from("function anonymous(context) {\n  with (context || {}) {\n    var _ = \"\";\n");
    for part in parts {
        let line = match part {
            Part::Literal(text) => format!("_ += \"{}\";", add_slashes(text).replace('\n', "\\n")),
            Part::Escaped(x) => {
                format!("_ += (typeof {x} === 'undefined') ? 'undefined' : escapeHtml({x});")
            }
            Part::Raw(x) => format!("_ += (typeof {x} === 'undefined') ? 'undefined' : {x};"),
            Part::Unguarded(x) => format!("_ += {x};"),
            Part::Statement(stmt) => stmt.clone(),
        };
        src.push_str("    ");
        src.push_str(&line);
        src.push('\n');
    }
    src.push_str("    return _;\n  }\n}");
    src
}
