//! Indentation-sensitive line parser: template source to node tree.
//!
//! Each line is classified on its own; nesting comes from an explicit stack
//! of open frames keyed by indentation width. A frame stays open until a line
//! at the same or a shallower width arrives, at which point it is attached to
//! its parent. Malformed lines never abort the parse: they produce a
//! [`Warning`] and a neutral placeholder node.

use crate::ast::{Element, Node, NodeKind};
use crate::diagnostics::{Warning, WarningKind};
use crate::filters::Filters;
use crate::header::{parse_header, Modifier};
use crate::html;

/// Result of parsing one template source.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub root: Node,
    pub warnings: Vec<Warning>,
}

/// Parse with the built-in filter set.
pub fn parse(source: &str) -> Parsed {
    Parser::new(source, &Filters::default()).parse()
}

/// Deepest element nesting kept; deeper lines are discarded with a warning.
/// A `-` block costs the script parser two levels, so this stays well under
/// [`crate::script::MAX_NESTING`].
pub const MAX_DEPTH: usize = 64;

/// Where the lines of an open text block go.
#[derive(Debug)]
enum Absorb {
    /// Not a text block.
    None,
    /// One child per line, with `#{}` injections.
    Children,
    /// One plain child per line (comment lines).
    Lines,
    /// Appended to the node's own text (`|` continuations).
    Continuation,
    /// Collected for a filter, joined when the frame closes.
    Buffer(Vec<String>),
    Discard,
}

#[derive(Debug)]
struct Frame {
    indent: isize,
    node: Node,
    absorb: Absorb,
    /// Cleared once a line ends the block; later lines are parsed normally.
    absorbing: bool,
    /// Width of the block's first line, the column every later line is cut at.
    text_indent: Option<usize>,
    pending_blanks: usize,
}

impl Frame {
    fn new(indent: isize, node: Node, absorb: Absorb) -> Self {
        let absorbing = !matches!(absorb, Absorb::None);
        Self {
            indent,
            node,
            absorb,
            absorbing,
            text_indent: None,
            pending_blanks: 0,
        }
    }

    fn absorb(&mut self, text: &str) {
        match &mut self.absorb {
            Absorb::None | Absorb::Discard => {}
            Absorb::Children => self.node.children.push(Node::interpolated(text)),
            Absorb::Lines => self.node.children.push(Node::text(text)),
            Absorb::Continuation => {
                if let NodeKind::Interpolated(own) = &mut self.node.kind {
                    own.push('\n');
                    own.push_str(text);
                }
            }
            Absorb::Buffer(lines) => lines.push(text.to_string()),
        }
    }
}

pub struct Parser<'a> {
    source: &'a str,
    filters: &'a Filters,
    stack: Vec<Frame>,
    warnings: Vec<Warning>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, filters: &'a Filters) -> Self {
        Self {
            source,
            filters,
            stack: vec![Frame::new(-1, Node::root(), Absorb::None)],
            warnings: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Parsed {
        let source = self.source.replace('\r', "");
        for (index, line) in source.split('\n').enumerate() {
            self.parse_line(index + 1, line);
        }
        self.close_frames(-1);
        let root = self.stack.pop().map(|f| f.node).unwrap_or_else(Node::root);
        Parsed {
            root,
            warnings: self.warnings,
        }
    }

    fn warn(&mut self, line: usize, text: &str, kind: WarningKind) {
        self.warnings.push(Warning {
            line,
            text: text.to_string(),
            kind,
        });
    }

    fn parse_line(&mut self, line_no: usize, line: &str) {
        let content_start = line.find(|c: char| !c.is_whitespace());
        let indent = content_start.map(|start| line[..start].chars().count());

        if self.absorb_line(line, indent) {
            return;
        }
        let (Some(start), Some(indent)) = (content_start, indent) else {
            return;
        };
        let indent = indent as isize;
        self.close_frames(indent);

        if self.stack.len() > MAX_DEPTH {
            self.warn(line_no, line, WarningKind::NestingTooDeep(MAX_DEPTH));
            let mut node = Node::new(NodeKind::Suppressed);
            node.is_text = true;
            self.stack.push(Frame::new(indent, node, Absorb::Discard));
            return;
        }

        let content = &line[start..];
        let (node, absorb) = self.classify(line_no, line, content);

        if let Some(parent) = self.stack.last() {
            if parent.node.no_children {
                let kind = match parent.node.as_element() {
                    Some(el) => WarningKind::VoidElementChildren(el.tag.clone()),
                    None => WarningKind::TextChildren,
                };
                self.warn(line_no, line, kind);
            }
        }
        self.stack.push(Frame::new(indent, node, absorb));
    }

    /// Feed the line to the innermost open text block, if it belongs there.
    fn absorb_line(&mut self, line: &str, indent: Option<usize>) -> bool {
        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        if !frame.absorbing {
            return false;
        }
        let Some(indent) = indent else {
            if frame.text_indent.is_some() {
                frame.pending_blanks += 1;
            }
            return true;
        };
        let deeper = indent as isize > frame.indent;
        let text_indent = *frame.text_indent.get_or_insert(indent);
        if !deeper || indent < text_indent {
            frame.absorbing = false;
            return false;
        }
        for _ in 0..std::mem::take(&mut frame.pending_blanks) {
            frame.absorb("");
        }
        let cut = line
            .char_indices()
            .nth(text_indent)
            .map_or(line.len(), |(i, _)| i);
        frame.absorb(&line[cut..]);
        true
    }

    fn close_frames(&mut self, indent: isize) {
        while self.stack.len() > 1 && self.stack.last().is_some_and(|f| f.indent >= indent) {
            let Some(frame) = self.stack.pop() else {
                break;
            };
            let node = self.finish(frame);
            if let Some(parent) = self.stack.last_mut() {
                parent.node.children.push(node);
            }
        }
    }

    /// Resolve a closing frame into the node that enters the tree.
    fn finish(&self, frame: Frame) -> Node {
        let Frame { node, absorb, .. } = frame;
        let Absorb::Buffer(lines) = absorb else {
            return node;
        };
        let filter = match &node.kind {
            NodeKind::Filter(name) => self.filters.get(name).cloned(),
            _ => return node,
        };
        match filter {
            Some(filter) => {
                let mut replacement = filter(&lines.join("\n"));
                replacement.children.extend(node.children);
                replacement
            }
            None => Node::new(NodeKind::Suppressed),
        }
    }

    fn classify(&mut self, line_no: usize, line: &str, content: &str) -> (Node, Absorb) {
        if let Some(rest) = content.strip_prefix('|') {
            let mut node = Node::interpolated(rest.strip_prefix(' ').unwrap_or(rest));
            node.is_text = true;
            return (node, Absorb::Continuation);
        }
        if let Some(rest) = content.strip_prefix('=') {
            return (Node::new(NodeKind::Escaped(rest.trim().into())), Absorb::None);
        }
        if let Some(rest) = content.strip_prefix("!=") {
            return (Node::new(NodeKind::Raw(rest.trim().into())), Absorb::None);
        }
        if content.starts_with("//-") {
            let mut node = Node::new(NodeKind::Suppressed);
            node.is_text = true;
            return (node, Absorb::Discard);
        }
        if let Some(rest) = content.strip_prefix("//") {
            let inline = rest.trim();
            let mut node = Node::new(NodeKind::Comment(
                (!inline.is_empty()).then(|| inline.to_string()),
            ));
            node.is_text = true;
            return (node, Absorb::Lines);
        }
        if let Some(arg) = keyword_argument(content, "doctype", true) {
            return (Node::text(html::doctype(arg)), Absorb::None);
        }
        if let Some(rest) = content.strip_prefix('-') {
            return (Node::new(NodeKind::Statement(rest.trim().into())), Absorb::None);
        }
        if let Some(rest) = content.strip_prefix(':') {
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .unwrap_or(rest.len());
            if len > 0 {
                return self.open_filter(line_no, line, &rest[..len], rest[len..].trim());
            }
        }
        if let Some(arg) = keyword_argument(content, "include", false) {
            self.warn(line_no, line, WarningKind::UnsupportedInclude);
            return (Node::new(NodeKind::Include(arg.into())), Absorb::None);
        }
        if let Some(arg) = keyword_argument(content, "extends", false) {
            self.warn(line_no, line, WarningKind::UnsupportedExtends);
            return (Node::new(NodeKind::Extends(arg.into())), Absorb::None);
        }
        self.element(line_no, line, content)
    }

    fn open_filter(&mut self, line_no: usize, line: &str, name: &str, inline: &str) -> (Node, Absorb) {
        if !self.filters.contains(name) {
            self.warn(line_no, line, WarningKind::UnknownFilter(name.into()));
            let mut node = Node::new(NodeKind::Suppressed);
            node.is_text = true;
            return (node, Absorb::Discard);
        }
        let mut node = Node::new(NodeKind::Filter(name.into()));
        node.is_text = true;
        let first = (!inline.is_empty()).then(|| inline.to_string());
        (node, Absorb::Buffer(first.into_iter().collect()))
    }

    fn element(&mut self, line_no: usize, line: &str, content: &str) -> (Node, Absorb) {
        let header = match parse_header(content) {
            Ok(Some(header)) => header,
            Ok(None) => return (Node::interpolated(content), Absorb::None),
            Err(reason) => {
                self.warn(line_no, line, WarningKind::MalformedAttributes(reason));
                return (Node::new(NodeKind::Suppressed), Absorb::None);
            }
        };

        let lower = header.tag.to_ascii_lowercase();
        let void = html::is_void_element(&lower);
        let mut node = Node::element(Element {
            tag: header.tag,
            attrs: header.attrs,
        });
        node.no_children = void;

        let rest = header.remainder;
        let inline = match header.modifier {
            Modifier::Eq => Some(Node::new(NodeKind::Escaped(rest))),
            Modifier::BangEq => Some(Node::new(NodeKind::Raw(rest))),
            Modifier::Dot | Modifier::None | Modifier::Other if rest.is_empty() => None,
            Modifier::Dot | Modifier::None | Modifier::Other => Some(Node::interpolated(rest)),
        };
        if let Some(child) = inline {
            if void {
                self.warn(line_no, line, WarningKind::VoidElementChildren(lower.clone()));
            } else {
                node.children.push(child);
            }
        }

        let text_block = header.modifier == Modifier::Dot
            || (header.modifier == Modifier::None && matches!(lower.as_str(), "script" | "style"));
        if text_block && !void {
            node.is_text = true;
            return (node, Absorb::Children);
        }
        (node, Absorb::None)
    }
}

/// If `content` starts with `word` as a whole word, the trimmed rest.
fn keyword_argument<'c>(content: &'c str, word: &str, ignore_case: bool) -> Option<&'c str> {
    let head = content.get(..word.len())?;
    let matches = if ignore_case {
        head.eq_ignore_ascii_case(word)
    } else {
        head == word
    };
    let rest = &content[word.len()..];
    (matches && (rest.is_empty() || rest.starts_with(char::is_whitespace))).then(|| rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AttrFragment;

    fn tags(node: &Node) -> Vec<String> {
        node.children
            .iter()
            .filter_map(|c| c.as_element().map(|e| e.tag.clone()))
            .collect()
    }

    #[test]
    fn empty_source_is_an_empty_root() {
        let parsed = parse("");
        assert_eq!(parsed.root, Node::root());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn dedent_closes_deeper_frames() {
        let parsed = parse("a\n  b\n    c\nd");
        let root = &parsed.root;
        assert_eq!(tags(root), ["a", "d"]);
        let b = &root.children[0].children[0];
        assert_eq!(tags(b), ["c"]);
    }

    #[test]
    fn uneven_indentation_finds_nearest_shallower_frame() {
        let parsed = parse("ul\n    li one\n  li two");
        // `li two` is shallower than `li one` but deeper than `ul`.
        assert_eq!(tags(&parsed.root.children[0]), ["li", "li"]);
    }

    #[test]
    fn pipe_text_absorbs_continuation_lines() {
        let parsed = parse("p\n  | first\n    second\n  | third");
        let p = &parsed.root.children[0];
        assert_eq!(p.children[0].kind, NodeKind::Interpolated("first\nsecond".into()));
        assert_eq!(p.children[1].kind, NodeKind::Interpolated("third".into()));
    }

    #[test]
    fn dot_block_keeps_relative_indentation_and_inner_blank_lines() {
        let parsed = parse("pre.\n  a\n\n    b\n\nnext");
        let pre = &parsed.root.children[0];
        let lines: Vec<_> = pre
            .children
            .iter()
            .map(|c| match &c.kind {
                NodeKind::Interpolated(t) => t.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(lines, ["a", "", "  b"]);
        assert_eq!(tags(&parsed.root), ["pre", "next"]);
    }

    #[test]
    fn comments() {
        let parsed = parse("// note\n  more\n//- hidden\n  also hidden\np");
        let root = &parsed.root;
        assert_eq!(root.children[0].kind, NodeKind::Comment(Some("note".into())));
        assert_eq!(root.children[0].children, vec![Node::text("more")]);
        assert_eq!(root.children[1].kind, NodeKind::Suppressed);
        assert!(root.children[1].children.is_empty());
        assert_eq!(tags(root), ["p"]);
    }

    #[test]
    fn doctype_variants() {
        assert_eq!(parse("doctype html").root.children[0], Node::text("<!DOCTYPE html>"));
        assert_eq!(parse("DOCTYPE xml").root.children[0], Node::text(r#"<?xml version="1.0" encoding="utf-8" ?>"#));
        assert_eq!(parse("doctypes").root.children[0].as_element().unwrap().tag, "doctypes");
    }

    #[test]
    fn statements_take_nested_children() {
        let parsed = parse("- if (x)\n  p yes");
        let stmt = &parsed.root.children[0];
        assert_eq!(stmt.kind, NodeKind::Statement("if (x)".into()));
        assert_eq!(tags(stmt), ["p"]);
    }

    #[test]
    fn javascript_filter_replaces_its_block() {
        let parsed = parse(":javascript\n  var a = 1;\n  a++;");
        let script = &parsed.root.children[0];
        assert_eq!(script.as_element().unwrap().tag, "script");
        assert_eq!(script.children, vec![Node::text("var a = 1;"), Node::text("a++;")]);
    }

    #[test]
    fn unknown_filter_warns_and_discards() {
        let parsed = parse(":markdown\n  # Title\np");
        assert_eq!(parsed.root.children[0].kind, NodeKind::Suppressed);
        assert!(parsed.root.children[0].children.is_empty());
        assert_eq!(parsed.warnings[0].kind, WarningKind::UnknownFilter("markdown".into()));
        assert_eq!(parsed.warnings[0].line, 1);
    }

    #[test]
    fn include_is_a_placeholder() {
        let parsed = parse("include header.jade");
        assert_eq!(parsed.root.children[0].kind, NodeKind::Include("header.jade".into()));
        assert_eq!(parsed.warnings[0].kind, WarningKind::UnsupportedInclude);
    }

    #[test]
    fn malformed_attributes_degrade_the_line() {
        let parsed = parse("p\na(href='x'\nb");
        assert_eq!(parsed.root.children[1].kind, NodeKind::Suppressed);
        assert_eq!(tags(&parsed.root), ["p", "b"]);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 2);
        assert_eq!(parsed.warnings[0].text, "a(href='x'");
    }

    #[test]
    fn children_of_void_elements_warn() {
        let parsed = parse("img(src='a.png')\n  p nested");
        let img = &parsed.root.children[0];
        assert!(img.no_children);
        assert_eq!(
            parsed.warnings[0].kind,
            WarningKind::VoidElementChildren("img".into())
        );
    }

    #[test]
    fn script_without_modifier_absorbs_its_block() {
        let parsed = parse("script\n  if (a < b) {\n    go();\n  }");
        let script = &parsed.root.children[0];
        assert!(script.is_text);
        assert_eq!(script.children.len(), 3);
        assert_eq!(script.children[1], Node::interpolated("  go();"));
    }

    #[test]
    fn nesting_past_the_limit_is_discarded() {
        let source: String = (0..MAX_DEPTH + 50)
            .map(|depth| format!("{}div\n", " ".repeat(depth)))
            .chain(std::iter::once("p after\n".to_string()))
            .collect();
        let parsed = parse(&source);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, WarningKind::NestingTooDeep(MAX_DEPTH));
        assert_eq!(parsed.warnings[0].line, MAX_DEPTH + 1);

        let mut depth = 0;
        let mut node = &parsed.root;
        while let Some(child) = node.children.first() {
            node = child;
            depth += 1;
        }
        assert_eq!(node.kind, NodeKind::Suppressed);
        assert_eq!(depth, MAX_DEPTH + 1);
        assert_eq!(tags(&parsed.root), ["div", "p"]);
    }

    #[test]
    fn literal_fallback_for_non_header_lines() {
        let parsed = parse("<em>hi</em>");
        assert_eq!(parsed.root.children[0], Node::interpolated("<em>hi</em>"));
    }

    #[test]
    fn header_attributes_reach_the_element() {
        let parsed = parse("a.btn(href=url) Go");
        let el = parsed.root.children[0].as_element().unwrap();
        assert_eq!(el.classes(), ["btn"]);
        assert_eq!(
            el.attrs[1],
            AttrFragment::Dynamic {
                name: "href".into(),
                expr: "url".into()
            }
        );
        assert_eq!(parsed.root.children[0].children, vec![Node::interpolated("Go")]);
    }
}
