use core::cell::RefCell;
use css_orchestrator::{
    ApplyShim, InMemoryDocument, NodeKey, ShimSettings, StyleHost, TemplateState,
};
use std::rc::Rc;

fn init() {
    let _log_init: Result<(), _> = env_logger::builder().is_test(true).try_init();
}

fn shim() -> ApplyShim<InMemoryDocument> {
    ApplyShim::new(InMemoryDocument::default(), ShimSettings::default())
}

fn head_style(shim: &mut ApplyShim<InMemoryDocument>, text: &str) -> NodeKey {
    let head = shim.host().head();
    shim.host_mut().append_style(head, text).unwrap()
}

fn template_with_styles(shim: &mut ApplyShim<InMemoryDocument>, styles: &[&str]) -> NodeKey {
    let doc = shim.host_mut();
    let template = doc.create_template();
    let content = doc.template_content(template).unwrap();
    for text in styles {
        doc.append_style(content, text).unwrap();
    }
    template
}

/// A custom element in the body with a shadow root holding one style.
fn custom_element(shim: &mut ApplyShim<InMemoryDocument>, parent: NodeKey, tag: &str) -> (NodeKey, NodeKey) {
    let doc = shim.host_mut();
    let element = doc.create_element(tag);
    doc.append_child(parent, element).unwrap();
    let shadow = doc.attach_shadow(element).unwrap();
    doc.append_style(shadow, "").unwrap();
    (element, shadow)
}

fn text(shim: &ApplyShim<InMemoryDocument>, node: NodeKey) -> String {
    shim.host().text_content(node).unwrap_or_default()
}

fn record_invalidations(shim: &mut ApplyShim<InMemoryDocument>) -> Rc<RefCell<Vec<String>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    shim.set_invalidation_callback(move |scope| sink.borrow_mut().push(scope.to_owned()));
    seen
}

#[test]
fn custom_styles_define_mixins_for_the_document() {
    init();
    let mut shim = shim();
    let style = head_style(
        &mut shim,
        ":root { --m: { color: red; }; }\n.a { @apply --m; }",
    );
    shim.add_custom_style(style);
    shim.flush_custom_styles();
    assert_eq!(
        text(&shim, style),
        "html {\n  --m_-_color: red;\n}\n\n.a {\n  color: var(--m_-_color);\n}\n\n"
    );
    assert_eq!(shim.custom_styles(), &[style]);
}

#[test]
fn trees_are_cached_until_the_text_changes() {
    init();
    let mut shim = shim();
    let style = head_style(&mut shim, ".a { color: red; }");
    let first = shim.transform_style(style, Some("x-a")).map(|tree| tree.len());
    let written = text(&shim, style);
    let second = shim.transform_style(style, Some("x-a")).map(|tree| tree.len());
    assert_eq!(first, second);
    assert_eq!(text(&shim, style), written);

    shim.host_mut()
        .set_text_content(style, ".a { color: red; } .b { top: 0; }")
        .unwrap();
    let reparsed = shim.transform_style(style, Some("x-a")).map(|tree| tree.len());
    assert!(reparsed > first);
    assert!(text(&shim, style).contains(".b {\n  top: 0;\n}"));

    shim.host_mut().set_text_content(style, "  ").unwrap();
    assert!(shim.transform_style(style, None).is_none());
    assert!(shim.sheet(style).is_none());
}

#[test]
fn stripping_removes_custom_syntax_from_output() {
    init();
    let settings = ShimSettings {
        native_css: Some(false),
        ..ShimSettings::default()
    };
    let mut shim = ApplyShim::new(InMemoryDocument::default(), settings);
    let style = head_style(&mut shim, "html { --m: { color: red; }; }\n.a { @apply --m; top: 0; }");
    assert!(shim.transform_style(style, None).is_some());
    assert_eq!(text(&shim, style), ".a {\n  top: 0;\n}\n\n");
}

#[test]
fn templates_gather_their_styles_once() {
    init();
    let mut shim = shim();
    let template = template_with_styles(&mut shim, &[".x { color: red; }", " .y { top: 0; } "]);
    shim.prepare_template(template, "x-foo");

    let content = shim.host().template_content(template).unwrap();
    let styles = shim.host().children(content);
    assert_eq!(styles.len(), 1);
    assert_eq!(
        text(&shim, styles[0]),
        ".x {\n  color: red;\n}\n\n.y {\n  top: 0;\n}\n\n"
    );
    assert_eq!(shim.template_state("x-foo"), Some(TemplateState::Fresh));
    assert!(shim.template_sheet("x-foo").is_some());

    shim.prepare_template(template, "x-foo");
    assert_eq!(shim.host().children(content), styles);
}

#[test]
fn prebuilt_templates_are_ignored() {
    init();
    let mut shim = shim();
    let by_attribute = template_with_styles(&mut shim, &[".x { @apply --m; }"]);
    shim.host_mut()
        .set_attribute(by_attribute, "css-build", "shadow")
        .unwrap();
    shim.prepare_template(by_attribute, "x-attr");
    assert_eq!(shim.template_state("x-attr"), None);

    let by_comment = template_with_styles(&mut shim, &[]);
    let content = shim.host().template_content(by_comment).unwrap();
    let comment = shim.host_mut().create_comment(" css-build:shady ");
    shim.host_mut().insert_first(content, comment).unwrap();
    shim.prepare_template(by_comment, "x-comment");
    assert_eq!(shim.template_state("x-comment"), None);
    assert_eq!(shim.host().leading_comment(content), None);

    let settings = ShimSettings {
        css_build: Some("shady".to_owned()),
        ..ShimSettings::default()
    };
    let mut global = ApplyShim::new(InMemoryDocument::default(), settings);
    let plain = template_with_styles(&mut global, &[".x { top: 0; }"]);
    global.prepare_template(plain, "x-global");
    assert_eq!(global.template_state("x-global"), None);
}

#[test]
fn unscoped_styles_are_hoisted_once_without_native_shadow() {
    init();
    let settings = ShimSettings {
        native_shadow: false,
        ..ShimSettings::default()
    };
    let mut shim = ApplyShim::new(InMemoryDocument::default(), settings);
    for scope in ["x-one", "x-two"] {
        let template = template_with_styles(&mut shim, &[".u { top: 0; }", ".s { left: 0; }"]);
        let content = shim.host().template_content(template).unwrap();
        let unscoped = shim.host().children(content)[0];
        shim.host_mut()
            .set_attribute(unscoped, "shady-unscoped", "")
            .unwrap();
        shim.prepare_template(template, scope);
        let remaining = shim.host().children(content);
        assert_eq!(remaining.len(), 1);
        assert_eq!(text(&shim, remaining[0]), ".s {\n  left: 0;\n}\n\n");
    }
    let head = shim.host().head();
    let hoisted = shim.host().descendant_styles(head);
    assert_eq!(hoisted.len(), 1);
    assert_eq!(text(&shim, hoisted[0]), ".u { top: 0; }");
}

#[test]
fn unscoped_styles_stay_put_with_native_shadow() {
    init();
    let mut shim = shim();
    let template = template_with_styles(&mut shim, &[".u { top: 0; }"]);
    let content = shim.host().template_content(template).unwrap();
    let unscoped = shim.host().children(content)[0];
    shim.host_mut()
        .set_attribute(unscoped, "shady-unscoped", "")
        .unwrap();
    shim.prepare_template(template, "x-native");
    assert_eq!(shim.host().children(content), vec![unscoped]);
    assert!(shim.template_sheet("x-native").is_none());
}

#[test]
fn stale_elements_are_restyled_and_settle_on_microtasks() {
    init();
    let mut shim = shim();
    let seen = record_invalidations(&mut shim);
    let template = template_with_styles(&mut shim, &[".x { @apply --m; }", ".y { color: blue; }"]);
    shim.prepare_template(template, "x-foo");
    assert_eq!(shim.template_state("x-foo"), Some(TemplateState::Fresh));

    let body = shim.host().body();
    let (element, shadow) = custom_element(&mut shim, body, "x-foo");
    let definitions = head_style(&mut shim, "html { --m: { color: red; }; }");
    shim.add_custom_style(definitions);

    shim.style_element(element);
    assert_eq!(*seen.borrow(), vec!["x-foo"]);
    assert_eq!(shim.template_state("x-foo"), Some(TemplateState::Validating));
    let shadow_style = shim.host().children(shadow)[0];
    assert_eq!(
        text(&shim, shadow_style),
        ".x {\n  color: var(--m_-_color);\n}\n\n.y {\n  color: blue;\n}\n\n"
    );

    assert_eq!(shim.run_microtasks(), 1);
    assert_eq!(shim.template_state("x-foo"), Some(TemplateState::Fresh));

    shim.host_mut().set_text_content(shadow_style, "untouched").unwrap();
    shim.style_element(element);
    assert_eq!(text(&shim, shadow_style), "untouched");
}

#[test]
fn elements_resolve_their_scope_from_is() {
    init();
    let mut shim = shim();
    let template = template_with_styles(&mut shim, &[".x { @apply --m; }"]);
    shim.prepare_template(template, "fancy-button");
    let definitions = head_style(&mut shim, "html { --m: { color: red; }; }");
    shim.add_custom_style(definitions);

    let body = shim.host().body();
    let (button, shadow) = custom_element(&mut shim, body, "button");
    shim.host_mut()
        .set_attribute(button, "is", "fancy-button")
        .unwrap();
    shim.style_element(button);
    let shadow_style = shim.host().children(shadow)[0];
    assert_eq!(text(&shim, shadow_style), ".x {\n  color: var(--m_-_color);\n}\n\n");
}

#[test]
fn style_document_reaches_elements_inside_shadow_roots() {
    init();
    let mut shim = shim();
    let outer = template_with_styles(&mut shim, &[".o { top: 0; }"]);
    let inner = template_with_styles(&mut shim, &[".i { @apply --m; }"]);
    shim.prepare_template(outer, "x-outer");
    shim.prepare_template(inner, "x-inner");

    let body = shim.host().body();
    let (_outer_element, outer_shadow) = custom_element(&mut shim, body, "x-outer");
    let (_inner_element, inner_shadow) = custom_element(&mut shim, outer_shadow, "x-inner");
    let definitions = head_style(&mut shim, "html { --m: { color: red; }; }");
    shim.add_custom_style(definitions);

    shim.style_document(&[("--accent", Some("teal"))]);
    assert_eq!(shim.computed_style_value(body, "--accent"), "teal");
    let inner_style = shim.host().children(inner_shadow)[0];
    assert_eq!(text(&shim, inner_style), ".i {\n  color: var(--m_-_color);\n}\n\n");
    let outer_style = shim.host().children(outer_shadow)[0];
    assert_eq!(text(&shim, outer_style), "");

    shim.style_document(&[("--accent", None)]);
    assert_eq!(shim.computed_style_value(body, "--accent"), "");
}

#[test]
fn initial_values_are_measured_with_a_probe() {
    init();
    let mut shim = shim();
    let style = head_style(&mut shim, "html { --m: { color: initial; display: initial; }; }");
    assert!(shim.transform_style(style, None).is_some());
    assert_eq!(
        text(&shim, style),
        "html {\n  --m_-_color: rgb(0, 0, 0); --m_-_display: inline;\n}\n\n"
    );
    let head = shim.host().head();
    let probes: Vec<_> = shim
        .host()
        .children(head)
        .into_iter()
        .filter(|node| shim.host().local_name(*node).as_deref() == Some("apply-shim-measure"))
        .collect();
    assert_eq!(probes.len(), 1);
}

#[test]
fn disabled_runtime_leaves_the_document_alone() {
    init();
    let settings = ShimSettings {
        disable_runtime: true,
        ..ShimSettings::default()
    };
    let mut shim = ApplyShim::new(InMemoryDocument::default(), settings);
    let template = template_with_styles(&mut shim, &[".x { top: 0; }"]);
    shim.prepare_template(template, "x-off");
    assert_eq!(shim.template_state("x-off"), None);

    let style = head_style(&mut shim, "html { --m: { color: red; }; }");
    shim.add_custom_style(style);
    shim.style_document(&[("--accent", Some("red"))]);
    assert_eq!(text(&shim, style), "html { --m: { color: red; }; }");
    let body = shim.host().body();
    assert_eq!(shim.computed_style_value(body, "--accent"), "");
}

#[test]
fn active_rules_follow_host_media() {
    init();
    let mut shim = shim();
    let style = head_style(
        &mut shim,
        "@media (max-width: 500px) { .narrow { top: 0; } }\n.always { top: 1px; }",
    );
    assert!(shim.transform_style(style, None).is_some());
    let tree = shim.sheet(style).unwrap();
    let selectors: Vec<&str> = shim
        .active_style_rules(style)
        .into_iter()
        .map(|rule| tree[rule].selector.as_str())
        .collect();
    assert_eq!(selectors, vec![".always"]);
    assert_eq!(tree.style_rules(None).len(), 2);
}

#[test]
fn detects_mixins_and_trims_computed_values() {
    init();
    let mut shim = shim();
    assert!(shim.detect_mixin(".a { @apply --m; }"));
    assert!(shim.detect_mixin(".a { --x: 1px; }"));
    assert!(!shim.detect_mixin(".a { color: red; }"));

    let body = shim.host().body();
    shim.host_mut()
        .set_inline_property(body, "color", Some("  red  "))
        .unwrap();
    assert_eq!(shim.computed_style_value(body, "color"), "red");
    assert_eq!(shim.computed_style_value(body, "no-such-property"), "");
    assert_eq!(shim.computed_style_value(NodeKey(4242), "color"), "");
}
