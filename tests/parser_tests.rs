use fastjade::ast::{AttrFragment, Node, NodeKind};
use fastjade::filters::Filters;
use fastjade::header::{parse_header, Modifier};
use fastjade::parser::{parse, Parser};
use fastjade::WarningKind;
use indoc::indoc;

fn kinds(node: &Node) -> Vec<&NodeKind> {
    node.children.iter().map(|c| &c.kind).collect()
}

#[test]
fn line_dispatch_priority() {
    let source = indoc! {"
        | text
        = escaped
        != raw
        //- quiet
        // loud
        doctype
        - stmt()
        include x
        extends y
        plain
    "};
    let parsed = parse(source);
    assert_eq!(
        kinds(&parsed.root)[..9],
        [
            &NodeKind::Interpolated("text".into()),
            &NodeKind::Escaped("escaped".into()),
            &NodeKind::Raw("raw".into()),
            &NodeKind::Suppressed,
            &NodeKind::Comment(Some("loud".into())),
            &NodeKind::Text("<!DOCTYPE html>".into()),
            &NodeKind::Statement("stmt()".into()),
            &NodeKind::Include("x".into()),
            &NodeKind::Extends("y".into()),
        ]
    );
    assert!(parsed.root.children[9].as_element().is_some());
    let warned: Vec<_> = parsed.warnings.iter().map(|w| (w.line, w.kind.clone())).collect();
    assert_eq!(
        warned,
        [
            (8, WarningKind::UnsupportedInclude),
            (9, WarningKind::UnsupportedExtends)
        ]
    );
}

#[test]
fn crlf_line_endings_are_ignored() {
    let parsed = parse("ul\r\n  li a\r\n  li b\r\n");
    let ul = &parsed.root.children[0];
    assert_eq!(ul.children.len(), 2);
    assert_eq!(ul.children[1].children, vec![Node::interpolated("b")]);
}

#[test]
fn tabs_count_as_one_column() {
    let parsed = parse("div\n\tp one\n\tp two");
    assert_eq!(parsed.root.children[0].children.len(), 2);
}

#[test]
fn text_block_ends_at_a_shallower_line() {
    let source = indoc! {"
        div
            p.
                deep text
              span after
    "};
    let parsed = parse(source);
    let p = &parsed.root.children[0].children[0];
    assert_eq!(p.children[0], Node::interpolated("deep text"));
    assert_eq!(p.children[1].as_element().unwrap().tag, "span");
}

#[test]
fn text_children_warn() {
    let parsed = parse("<b>literal</b>\n  p nested");
    assert_eq!(parsed.warnings[0].kind, WarningKind::TextChildren);
    assert_eq!(parsed.warnings[0].line, 2);
}

#[test]
fn filter_inline_text_is_the_first_line() {
    let parsed = parse(":javascript go();\n  more();");
    let script = &parsed.root.children[0];
    assert_eq!(script.children, vec![Node::text("go();"), Node::text("more();")]);
}

#[test]
fn filters_without_builtins() {
    let filters = Filters::empty();
    let parsed = Parser::new(":javascript\n  x", &filters).parse();
    assert_eq!(parsed.root.children[0].kind, NodeKind::Suppressed);
    assert_eq!(
        parsed.warnings[0].kind,
        WarningKind::UnknownFilter("javascript".into())
    );
}

#[test]
fn header_contract() {
    let header = parse_header("a.nav#home(href='/', rel=rel). Home").unwrap().unwrap();
    assert_eq!(header.tag, "a");
    assert_eq!(header.modifier, Modifier::Dot);
    assert_eq!(header.remainder, "Home");
    assert_eq!(
        header.attrs,
        [
            AttrFragment::Static {
                name: "class".into(),
                value: Some("nav".into())
            },
            AttrFragment::Static {
                name: "id".into(),
                value: Some("home".into())
            },
            AttrFragment::Static {
                name: "href".into(),
                value: Some("/".into())
            },
            AttrFragment::Dynamic {
                name: "rel".into(),
                expr: "rel".into()
            },
        ]
    );
}

#[test]
fn malformed_line_does_not_disturb_its_neighbours() {
    let source = indoc! {"
        ul
          li one
          li(class=) two
          li three
    "};
    let parsed = parse(source);
    let ul = &parsed.root.children[0];
    assert_eq!(ul.children.len(), 3);
    assert_eq!(ul.children[1].kind, NodeKind::Suppressed);
    assert!(matches!(
        &parsed.warnings[0].kind,
        WarningKind::MalformedAttributes(reason) if reason.contains("class")
    ));
}
