//! Node tree to linear part sequence.

use crate::ast::{AttrFragment, Node, NodeKind, Part};
use crate::error::InternalError;
use crate::html::{add_slashes, escape_html, is_void_element};

/// Appends parts, merging adjacent literals and dropping empty ones.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartsCombinator {
    parts: Vec<Part>,
}

impl PartsCombinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: Part) {
        if let Part::Literal(text) = &part {
            if text.is_empty() {
                return;
            }
            if let Some(Part::Literal(prev)) = self.parts.last_mut() {
                prev.push_str(text);
                return;
            }
        }
        self.parts.push(part);
    }

    pub fn literal(&mut self, text: &str) {
        if !text.is_empty() {
            self.push(Part::Literal(text.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

/// A piece of text split around `#{}` / `!{}` injections.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Literal(String),
    Escaped(&'a str),
    Raw(&'a str),
}

/// Split `text` into literal runs and injections, in order.
///
/// `\#{` and `\!{` stand for the markers themselves. An injection whose
/// closing brace never comes takes the rest of the text as its expression.
pub fn split_injections(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("\\#{") || rest.starts_with("\\!{") {
            literal.push_str(&rest[1..3]);
            i += 3;
            continue;
        }
        if rest.starts_with("#{") || rest.starts_with("!{") {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let body = &rest[2..];
            let (expr, consumed) = match closing_brace(body) {
                Some(end) => (&body[..end], 2 + end + 1),
                None => (body, rest.len()),
            };
            let expr = expr.trim();
            segments.push(if rest.starts_with('#') {
                Segment::Escaped(expr)
            } else {
                Segment::Raw(expr)
            });
            i += consumed;
            continue;
        }
        let ch = rest.chars().next().unwrap_or_default();
        literal.push(ch);
        i += ch.len_utf8();
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Byte offset of the `}` closing an injection body, skipping nested braces
/// and braces inside string literals.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' => loop {
                match chars.next()? {
                    (_, '\\') => {
                        chars.next();
                    }
                    (_, q) if q == c => break,
                    _ => {}
                }
            },
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Whether an element lays its children out one per line.
fn is_block(node: &Node) -> bool {
    match node.children.as_slice() {
        [] => false,
        [only] => !only.children.is_empty(),
        _ => true,
    }
}

struct Linearizer {
    out: PartsCombinator,
}

impl Linearizer {
    fn children(&mut self, children: &[Node], block: bool) -> Result<(), InternalError> {
        for child in children {
            self.node(child, block)?;
        }
        Ok(())
    }

    fn newline(&mut self, block: bool) {
        if block {
            self.out.literal("\n");
        }
    }

    fn node(&mut self, node: &Node, block: bool) -> Result<(), InternalError> {
        match &node.kind {
            NodeKind::Root | NodeKind::Filter(_) => {
                return Err(InternalError(format!(
                    "unexpected {:?} node inside the tree",
                    node.kind
                )));
            }
            NodeKind::Suppressed => {}
            NodeKind::Include(_) | NodeKind::Extends(_) => self.children(&node.children, block)?,
            NodeKind::Statement(stmt) if node.children.is_empty() => {
                self.out.push(Part::Statement(stmt.clone()));
            }
            NodeKind::Statement(stmt) => {
                self.out.push(Part::Statement(format!("{stmt} {{")));
                self.children(&node.children, block)?;
                self.out.push(Part::Statement("}".into()));
            }
            NodeKind::Text(text) => {
                self.out.literal(text);
                self.newline(block);
            }
            NodeKind::Interpolated(text) => {
                self.injections(text, false);
                self.newline(block);
            }
            NodeKind::Escaped(expr) => {
                self.out.push(Part::Escaped(expr.clone()));
                self.newline(block);
                self.children(&node.children, block)?;
            }
            NodeKind::Raw(expr) => {
                self.out.push(Part::Raw(expr.clone()));
                self.newline(block);
                self.children(&node.children, block)?;
            }
            NodeKind::Comment(inline) => {
                self.out.literal("<!--");
                if let Some(text) = inline {
                    self.out.literal(" ");
                    self.out.literal(text);
                }
                if node.children.is_empty() {
                    if inline.is_some() {
                        self.out.literal(" ");
                    }
                } else {
                    self.out.literal("\n");
                    self.children(&node.children, true)?;
                }
                self.out.literal("-->");
                self.newline(block);
            }
            NodeKind::Element(el) => {
                let tag = el.tag.to_ascii_lowercase();
                self.out.literal("<");
                self.out.literal(&tag);
                self.attributes(&el.attrs);
                if is_void_element(&tag) {
                    self.out.literal("/>");
                    self.newline(block);
                    return Ok(());
                }
                self.out.literal(">");
                if !node.no_children {
                    let inner = is_block(node);
                    self.newline(inner);
                    self.children(&node.children, inner)?;
                }
                self.out.literal("</");
                self.out.literal(&tag);
                self.out.literal(">");
                self.newline(block);
            }
        }
        Ok(())
    }

    fn injections(&mut self, text: &str, escape_literals: bool) {
        for segment in split_injections(text) {
            match segment {
                Segment::Literal(lit) if escape_literals => self.out.literal(&escape_html(&lit)),
                Segment::Literal(lit) => self.out.literal(&lit),
                Segment::Escaped(expr) => self.out.push(Part::Escaped(expr.to_string())),
                Segment::Raw(expr) => self.out.push(Part::Raw(expr.to_string())),
            }
        }
    }

    fn attributes(&mut self, attrs: &[AttrFragment]) {
        for attr in attrs {
            match attr {
                AttrFragment::Static { name, value: None } => {
                    self.out.literal(" ");
                    self.out.literal(name);
                }
                AttrFragment::Static {
                    name,
                    value: Some(value),
                } => {
                    self.out.literal(&format!(" {name}=\""));
                    self.injections(value, true);
                    self.out.literal("\"");
                }
                AttrFragment::Dynamic { name, expr } => {
                    self.out.push(Part::Unguarded(attribute_expression(name, expr)));
                }
            }
        }
    }
}

/// The expression deciding how a bound attribute renders; empty when the
/// value is undefined.
pub fn attribute_expression(name: &str, expr: &str) -> String {
    format!(
        "typeof ({expr}) === \"undefined\" ? \"\" : $attr(\"{}\", {expr})",
        add_slashes(name)
    )
}

/// Flatten a parsed tree into parts.
///
/// Root children are laid out one per line; the newline after the final
/// literal is dropped.
pub fn linearize(root: &Node) -> Result<Vec<Part>, InternalError> {
    let mut linearizer = Linearizer {
        out: PartsCombinator::new(),
    };
    match root.kind {
        NodeKind::Root => linearizer.children(&root.children, true)?,
        _ => linearizer.node(root, false)?,
    }
    let mut parts = linearizer.out.into_parts();
    if let Some(Part::Literal(text)) = parts.last_mut() {
        if text.ends_with('\n') {
            text.pop();
            if text.is_empty() {
                parts.pop();
            }
        }
    }
    tracing::trace!(parts = parts.len(), "linearized template");
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Element;
    use crate::parser::parse;

    fn parts(source: &str) -> Vec<Part> {
        linearize(&parse(source).root).unwrap()
    }

    fn lit(s: &str) -> Part {
        Part::Literal(s.into())
    }

    #[test]
    fn combinator_merges_literals() {
        let mut out = PartsCombinator::new();
        out.literal("a");
        out.push(lit(""));
        out.literal("b");
        out.push(Part::Escaped("x".into()));
        out.literal("c");
        assert_eq!(
            out.into_parts(),
            vec![lit("ab"), Part::Escaped("x".into()), lit("c")]
        );
    }

    #[test]
    fn injections_split_in_order() {
        assert_eq!(
            split_injections("a #{x} b !{y} c"),
            vec![
                Segment::Literal("a ".into()),
                Segment::Escaped("x"),
                Segment::Literal(" b ".into()),
                Segment::Raw("y"),
                Segment::Literal(" c".into()),
            ]
        );
    }

    #[test]
    fn injection_braces_and_strings() {
        assert_eq!(
            split_injections("#{ {a: 1}.a } #{'}'}"),
            vec![
                Segment::Escaped("{a: 1}.a"),
                Segment::Literal(" ".into()),
                Segment::Escaped("'}'"),
            ]
        );
    }

    #[test]
    fn escaped_and_unterminated_injections() {
        assert_eq!(
            split_injections(r"\#{x} #{y"),
            vec![Segment::Literal("#{x} ".into()), Segment::Escaped("y")]
        );
    }

    #[test]
    fn single_leaf_child_is_inline() {
        assert_eq!(parts("p hello"), vec![lit("<p>hello</p>")]);
    }

    #[test]
    fn multi_child_elements_break_lines() {
        assert_eq!(
            parts("ul\n  li a\n  li b"),
            vec![lit("<ul>\n<li>a</li>\n<li>b</li>\n</ul>")]
        );
    }

    #[test]
    fn statements_wrap_their_children() {
        assert_eq!(
            parts("- if (x)\n  p yes"),
            vec![
                Part::Statement("if (x) {".into()),
                lit("<p>yes</p>\n"),
                Part::Statement("}".into()),
            ]
        );
    }

    #[test]
    fn void_elements_self_close_and_drop_children() {
        assert_eq!(parts("br\n  p x"), vec![lit("<br/>")]);
    }

    #[test]
    fn attributes_in_declaration_order() {
        assert_eq!(
            parts(r#"a#top.x(href="/?a=1&b=2" data-n=n)"#),
            vec![
                lit(r#"<a id="top" class="x" href="/?a=1&amp;b=2""#),
                Part::Unguarded(attribute_expression("data-n", "n")),
                lit("></a>"),
            ]
        );
    }

    #[test]
    fn comment_layouts() {
        assert_eq!(parts("// hi"), vec![lit("<!-- hi -->")]);
        assert_eq!(parts("//\n  a\n  b"), vec![lit("<!--\na\nb\n-->")]);
    }

    #[test]
    fn tags_are_lower_cased() {
        assert_eq!(parts("DIV x"), vec![lit("<div>x</div>")]);
    }

    #[test]
    fn nested_root_is_an_internal_error() {
        let tree = Node::root().with_child(Node::root());
        assert!(linearize(&tree).is_err());
        let filter = Node::root().with_child(Node::new(NodeKind::Filter("x".into())));
        assert!(linearize(&filter).is_err());
    }

    #[test]
    fn non_root_nodes_linearize_on_their_own() {
        let node = Node::element(Element::new("b")).with_child(Node::text("x"));
        assert_eq!(linearize(&node).unwrap(), vec![lit("<b>x</b>")]);
    }
}
