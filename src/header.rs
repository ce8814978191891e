//! Element header sub-parser: `tag#id.class(attr="v", attr=expr)` plus the
//! single trailing modifier that decides what the rest of the line means.

use crate::ast::AttrFragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Nothing, or whitespace followed by inline text.
    None,
    /// `.`: the element owns a text block.
    Dot,
    /// `=`: escaped expression.
    Eq,
    /// `!=`: raw expression.
    BangEq,
    /// Anything else; the remainder is kept as text, unstripped.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub tag: String,
    pub attrs: Vec<AttrFragment>,
    pub modifier: Modifier,
    pub remainder: String,
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_selector_char(c: char) -> bool {
    is_tag_char(c) || ('\u{00C0}'..='\u{024F}').contains(&c)
}

/// Parse the header of an element line (already stripped of indentation).
///
/// Returns `Ok(None)` when the line has no tag, selector or attribute list,
/// in which case it is literal text. An `Err` carries the reason an
/// attribute list could not be read.
pub fn parse_header(line: &str) -> Result<Option<Header>, String> {
    let tag_len = line.find(|c: char| !is_tag_char(c)).unwrap_or(line.len());
    let mut tag = line[..tag_len].to_string();
    let mut rest = &line[tag_len..];

    let mut id: Option<String> = None;
    let mut classes: Vec<String> = Vec::new();
    // Whether id or class was seen first decides their emission order.
    let mut id_first = false;
    let mut attrs = Vec::new();
    let mut saw_parens = false;

    loop {
        let mut chars = rest.chars();
        let (Some(sigil @ ('.' | '#')), Some(next)) = (chars.next(), chars.next()) else {
            if rest.starts_with('(') && !saw_parens {
                saw_parens = true;
                let consumed = parse_attributes(&rest[1..], &mut attrs)?;
                rest = &rest[1 + consumed..];
                continue;
            }
            break;
        };
        if !is_selector_char(next) {
            break;
        }
        let body = &rest[1..];
        let len = body.find(|c: char| !is_selector_char(c)).unwrap_or(body.len());
        let name = &body[..len];
        if sigil == '#' {
            if id.is_none() {
                id_first = classes.is_empty();
                id = Some(name.to_string());
            }
        } else {
            classes.push(name.to_string());
        }
        rest = &body[len..];
    }

    if tag.is_empty() {
        if id.is_none() && classes.is_empty() && !saw_parens {
            return Ok(None);
        }
        tag = "div".to_string();
    }

    let mut selectors = Vec::new();
    let class_attr = (!classes.is_empty()).then(|| AttrFragment::Static {
        name: "class".into(),
        value: Some(classes.join(" ")),
    });
    let id_attr = id.map(|id| AttrFragment::Static {
        name: "id".into(),
        value: Some(id),
    });
    if id_first {
        selectors.extend(id_attr);
        selectors.extend(class_attr);
    } else {
        selectors.extend(class_attr);
        selectors.extend(id_attr);
    }
    selectors.append(&mut attrs);

    let (modifier, remainder) = if let Some(r) = rest.strip_prefix("!=") {
        (Modifier::BangEq, r.trim())
    } else if let Some(r) = rest.strip_prefix('=') {
        (Modifier::Eq, r.trim())
    } else if let Some(r) = rest.strip_prefix('.') {
        (Modifier::Dot, r.trim())
    } else if rest.is_empty() {
        (Modifier::None, "")
    } else if rest.starts_with(char::is_whitespace) {
        let skip = rest.chars().next().map_or(0, char::len_utf8);
        (Modifier::None, &rest[skip..])
    } else {
        (Modifier::Other, rest)
    };

    Ok(Some(Header {
        tag,
        attrs: selectors,
        modifier,
        remainder: remainder.to_string(),
    }))
}

/// Parse entries after the opening `(` up to and including the closing `)`.
/// Returns the number of bytes consumed.
fn parse_attributes(input: &str, out: &mut Vec<AttrFragment>) -> Result<usize, String> {
    let mut pos = 0;
    loop {
        pos += input[pos..]
            .find(|c: char| !(c.is_whitespace() || c == ','))
            .unwrap_or(input.len() - pos);
        let Some(c) = input[pos..].chars().next() else {
            return Err("unterminated attribute list".into());
        };
        if c == ')' {
            return Ok(pos + 1);
        }

        let name_len = input[pos..]
            .find(|c: char| c.is_whitespace() || "=,()'\"".contains(c))
            .unwrap_or(input.len() - pos);
        if name_len == 0 {
            return Err(format!("unexpected `{c}`"));
        }
        let name = input[pos..pos + name_len].to_string();
        pos += name_len;

        let after_ws = pos
            + input[pos..]
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(input.len() - pos);
        if !input[after_ws..].starts_with('=') {
            out.push(AttrFragment::Static { name, value: None });
            continue;
        }
        pos = after_ws + 1;
        pos += input[pos..]
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(input.len() - pos);

        let len = scan_value(&input[pos..])?;
        if len == 0 {
            return Err(format!("missing value for `{name}`"));
        }
        let text = &input[pos..pos + len];
        pos += len;
        out.push(match quoted_literal(text) {
            Some(value) => AttrFragment::Static {
                name,
                value: Some(value),
            },
            None => AttrFragment::Dynamic {
                name,
                expr: text.to_string(),
            },
        });
    }
}

/// Length of an attribute value: up to top-level whitespace, `,` or `)`.
fn scan_value(input: &str) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => loop {
                match chars.next() {
                    Some((_, '\\')) => {
                        chars.next();
                    }
                    Some((_, q)) if q == c => break,
                    Some(_) => {}
                    None => return Err("unterminated string in attribute value".into()),
                }
            },
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Ok(i),
            ')' | ']' | '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced `{c}`"))?;
            }
            ',' if depth == 0 => return Ok(i),
            c if c.is_whitespace() && depth == 0 => return Ok(i),
            _ => {}
        }
    }
    Ok(input.len())
}

/// The unescaped content of `text` if it is exactly one quoted string.
fn quoted_literal(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let quote = chars.next().filter(|c| *c == '"' || *c == '\'')?;
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?),
            c if c == quote => return chars.next().is_none().then_some(value),
            c => value.push(c),
        }
    }
    None
}
