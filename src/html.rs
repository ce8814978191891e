//! HTML and string-literal helpers shared by the compiler and the runtime.

use crate::value::Value;

/// Elements that never get a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Doctype used when `doctype` has no argument.
pub const DEFAULT_DOCTYPE: &str = "<!DOCTYPE html>";

const DOCTYPES: &[(&str, &str)] = &[
    ("html", "<!DOCTYPE html>"),
    ("5", "<!DOCTYPE html>"),
    ("default", "<!DOCTYPE html>"),
    ("xml", r#"<?xml version="1.0" encoding="utf-8" ?>"#),
    (
        "transitional",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#,
    ),
    (
        "strict",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#,
    ),
    (
        "frameset",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#,
    ),
    (
        "1.1",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#,
    ),
    (
        "basic",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#,
    ),
    (
        "mobile",
        r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#,
    ),
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Resolve the argument of a `doctype` line to a declaration.
///
/// Known keywords are matched case-insensitively; anything else becomes
/// `<!DOCTYPE arg>` with the argument's original case.
pub fn doctype(arg: &str) -> String {
    let arg = arg.trim();
    if arg.is_empty() {
        return DEFAULT_DOCTYPE.to_string();
    }
    let lower = arg.to_ascii_lowercase();
    DOCTYPES
        .iter()
        .find(|(key, _)| *key == lower)
        .map(|(_, decl)| decl.to_string())
        .unwrap_or_else(|| format!("<!DOCTYPE {arg}>"))
}

pub fn escape_html(unsafe_text: &str) -> String {
    let mut out = String::with_capacity(unsafe_text.len() + 8);
    for ch in unsafe_text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape backslashes and double quotes so `text` can sit inside a
/// double-quoted string literal.
pub fn add_slashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}

/// Render an object as a CSS declaration list; `fontSize` becomes
/// `font-size`. Strings pass through unchanged.
pub fn object_to_css_string(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, val)| format!("{}:{}", kebab_case(key), val))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
