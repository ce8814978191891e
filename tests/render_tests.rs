use fastjade::{compile, Context, Value};
use indoc::indoc;
use insta::assert_snapshot;

fn render(source: &str, ctx: &Context) -> String {
    compile(source, Some("test")).unwrap().render(ctx).unwrap()
}

fn ctx(json: serde_json::Value) -> Context {
    Context::from_json(json).unwrap()
}

#[test]
fn full_page() {
    let source = indoc! {"
        doctype html
        html
          head
            title= title
          body
            h1.title Hello #{name}
            ul#list
              - for (var i = 0; i < items.length; i++)
                li= items[i]
            p.
              Some text
              across lines
    "};
    let out = render(
        source,
        &ctx(serde_json::json!({"title": "T", "name": "Bob", "items": ["a", "b"]})),
    );
    assert_snapshot!(out, @r#"
    <!DOCTYPE html>
    <html>
    <head>
    <title>T</title>
    </head>
    <body>
    <h1 class="title">Hello Bob</h1>
    <ul id="list">
    <li>a</li>
    <li>b</li>
    </ul>
    <p>
    Some text
    across lines
    </p>
    </body>
    </html>
    "#);
}

#[test]
fn if_else_blocks() {
    let source = indoc! {"
        - if (user)
          p Welcome #{user.name}
        - else
          p Please log in
    "};
    assert_eq!(
        render(source, &ctx(serde_json::json!({"user": {"name": "Ann"}}))),
        "<p>Welcome Ann</p>\n"
    );
    assert_eq!(
        render(source, &ctx(serde_json::json!({"user": null}))),
        "<p>Please log in</p>\n"
    );
}

#[test]
fn bound_attributes() {
    let source = r#"a(href=url, class=classes, disabled=off, title="a & b") link"#;
    let out = render(
        source,
        &ctx(serde_json::json!({"url": "/x?a=1&b=2", "classes": ["btn", "big"], "off": false})),
    );
    assert_eq!(
        out,
        r#"<a href="/x?a=1&amp;b=2" class="btn big" title="a &amp; b">link</a>"#
    );
}

#[test]
fn boolean_and_style_attributes() {
    assert_eq!(
        render(r#"input(type="checkbox", checked=true)"#, &Context::new()),
        r#"<input type="checkbox" checked/>"#
    );
    assert_eq!(
        render("div(style={color: 'red', fontSize: '12px'})", &Context::new()),
        r#"<div style="color:red; font-size:12px"></div>"#
    );
}

#[test]
fn injections_inside_quoted_attributes() {
    let out = render(
        r#"a(href="/users/#{id}", title="!{raw}")"#,
        &ctx(serde_json::json!({"id": "<7>", "raw": "<b>"})),
    );
    assert_eq!(out, r#"<a href="/users/&lt;7&gt;" title="<b>"></a>"#);
}

#[test]
fn missing_variables_in_output_render_undefined() {
    assert_eq!(render("p= missing", &Context::new()), "<p>undefined</p>");
    assert_eq!(render("p Hi #{missing}", &Context::new()), "<p>Hi undefined</p>");
}

#[test]
fn comments() {
    assert_eq!(render("// hello", &Context::new()), "<!-- hello -->");
    assert_eq!(render("//- hidden\np shown", &Context::new()), "<p>shown</p>");
    let block = indoc! {"
        //
          line one
          line two
    "};
    assert_eq!(render(block, &Context::new()), "<!--\nline one\nline two\n-->");
}

#[test]
fn pipe_text_mixes_with_elements() {
    let source = indoc! {"
        p
          | Hello
          strong world
    "};
    assert_eq!(render(source, &Context::new()), "<p>\nHello\n<strong>world</strong>\n</p>");
}

#[test]
fn javascript_filter() {
    let source = indoc! {"
        :javascript
          var x = 1;
          alert(x);
    "};
    assert_snapshot!(render(source, &Context::new()), @r#"
    <script type="text/javascript">
    var x = 1;
    alert(x);
    </script>
    "#);
}

#[test]
fn inline_script_stays_inline() {
    assert_eq!(render("script alert(1)", &Context::new()), "<script>alert(1)</script>");
}

#[test]
fn loop_over_objects_with_conditional_attribute() {
    let source = indoc! {"
        ul
          - for (const item of items)
            li(class=(item.active ? 'on' : 'off'))= item.name
    "};
    let out = render(
        source,
        &ctx(serde_json::json!({"items": [
            {"name": "A", "active": true},
            {"name": "B", "active": false}
        ]})),
    );
    assert_snapshot!(out, @r#"
    <ul>
    <li class="on">A</li>
    <li class="off">B</li>
    </ul>
    "#);
}

#[test]
fn registered_functions() {
    let mut context = Context::new().with_var("name", "ann");
    context.register_fn("shout", |args| {
        let text = args.first().map(Value::to_string).unwrap_or_default();
        Ok(Value::from(text.to_uppercase()))
    });
    assert_eq!(render("p= shout(name)", &context), "<p>ANN</p>");
}

#[test]
fn unknown_filters_and_includes_render_nothing() {
    let source = indoc! {"
        include partial.jade
        :markdown
          # Title
        p after
    "};
    let template = compile(source, None).unwrap();
    assert_eq!(template.warnings().len(), 2);
    assert_eq!(template.render(&Context::new()).unwrap(), "<p>after</p>");
}

#[test]
fn renders_from_many_threads() {
    let template = compile("p= n * 2", None).unwrap();
    std::thread::scope(|scope| {
        for n in 0..4 {
            let template = template.clone();
            scope.spawn(move || {
                let ctx = Context::new().with_var("n", n);
                assert_eq!(template.render(&ctx).unwrap(), format!("<p>{}</p>", n * 2));
            });
        }
    });
}
