//! Whole-pipeline properties of compiled templates.

use fastjade::ast::NodeKind;
use fastjade::parser::parse;
use fastjade::{compile, Context, WarningKind};
use indoc::indoc;

fn render(source: &str, ctx: &Context) -> String {
    compile(source, None).unwrap().render(ctx).unwrap()
}

#[test]
fn plain_text_round_trips_through_pipe_lines() {
    let source = indoc! {"
        html
          body
            h1 Title
            p Hello world
            p
              | first
              | second
    "};
    let html = render(source, &Context::new());

    let as_text: String = html.lines().map(|line| format!("| {line}\n")).collect();
    assert_eq!(render(&as_text, &Context::new()), html);
}

#[test]
fn void_elements_never_close_or_render_children() {
    let source = indoc! {"
        div
          img(src='a.png')
            p nested
          br
    "};
    let template = compile(source, None).unwrap();
    let out = template.render(&Context::new()).unwrap();
    assert_eq!(out, "<div>\n<img src=\"a.png\"/>\n<br/>\n</div>");
    assert!(!out.contains("nested"));
    assert_eq!(
        template.warnings()[0].kind,
        WarningKind::VoidElementChildren("img".into())
    );
}

#[test]
fn void_element_inline_text_is_dropped_with_a_warning() {
    let template = compile("br text", None).unwrap();
    assert_eq!(template.render(&Context::new()).unwrap(), "<br/>");
    assert_eq!(template.warnings().len(), 1);
}

#[test]
fn doctypes() {
    let empty = Context::new();
    assert_eq!(render("doctype html", &empty), "<!DOCTYPE html>");
    assert_eq!(render("doctype customthing", &empty), "<!DOCTYPE customthing>");
    assert_eq!(render("doctype", &empty), "<!DOCTYPE html>");
    assert_eq!(render("Doctype 5", &empty), "<!DOCTYPE html>");
}

#[test]
fn selectors_become_id_and_class() {
    let parsed = parse("div.a.b#x");
    let el = parsed.root.children[0].as_element().unwrap();
    assert_eq!(el.tag, "div");
    assert_eq!(el.classes(), ["a", "b"]);
    assert_eq!(el.id(), Some("x"));
    assert_eq!(
        render("div.a.b#x", &Context::new()),
        r#"<div class="a b" id="x"></div>"#
    );
}

#[test]
fn escaped_and_raw_expressions() {
    let ctx = Context::new().with_var("name", "<b>");
    assert_eq!(render("p= name", &ctx), "<p>&lt;b&gt;</p>");
    assert_eq!(render("p!= name", &ctx), "<p><b></p>");
}

#[test]
fn undefined_attributes_are_omitted() {
    assert_eq!(render("a(href=missingVar) go", &Context::new()), "<a>go</a>");
    let ctx = Context::new().with_var("missingVar", fastjade::Value::Null);
    assert_eq!(render("a(href=missingVar) go", &ctx), "<a>go</a>");
}

#[test]
fn dedent_attaches_to_the_right_ancestor() {
    let source = "a\n  b\n    c\nd";
    let root = parse(source).root;
    assert_eq!(root.children.len(), 2);
    let a = &root.children[0];
    let b = &a.children[0];
    let c = &b.children[0];
    assert!(matches!(&c.kind, NodeKind::Element(el) if el.tag == "c"));
    assert!(c.children.is_empty());
    assert!(matches!(&root.children[1].kind, NodeKind::Element(el) if el.tag == "d"));

    assert_eq!(
        render(source, &Context::new()),
        "<a>\n<b><c></c></b>\n</a>\n<d></d>"
    );
}

#[test]
fn empty_source_renders_nothing() {
    assert_eq!(render("", &Context::new()), "");
    assert_eq!(render("\n\n", &Context::new()), "");
}
