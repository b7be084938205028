use form_sense::dom::label::{clean_label, find_label};
use form_sense::dom::{MutationKind, NodeSnapshot, Page, Selector};
use tokio::sync::broadcast::error::TryRecvError;

mod common;
use crate::common::pages::{input, labelled, page_with};

fn sel(source: &str) -> Selector {
    Selector::parse(source).unwrap()
}

fn signup_page() -> Page {
    page_with([NodeSnapshot::new("div").attr("id", "app").child(
        NodeSnapshot::new("form").class("signup wide").children([
            input("email", "email").attr("id", "email"),
            input("text", "cpf"),
            NodeSnapshot::new("div").children([input("text", ""), input("text", "")]),
        ]),
    )])
}

// ============================================================================
// Selector
// ============================================================================

#[test]
fn selector_matches_descendants_and_children() {
    let page = signup_page();
    assert_eq!(page.query_all(&sel("form.signup input")).len(), 4);
    assert_eq!(page.query_all(&sel("form > input")).len(), 2);
    assert!(page.query_all(&sel("#app > input")).is_empty());
    assert_eq!(page.query_all(&sel("div#app form.wide")).len(), 1);
}

#[test]
fn selector_attribute_operators() {
    let page = signup_page();
    assert_eq!(page.query_all(&sel("input[name^=em]")).len(), 1);
    assert_eq!(page.query_all(&sel("input[name$=\"pf\"]")).len(), 1);
    assert_eq!(page.query_all(&sel("input[name*=mai]")).len(), 1);
    assert_eq!(page.query_all(&sel("[class~=signup]")).len(), 1);
    assert_eq!(page.query_all(&sel("input[type='text']")).len(), 3);
    assert_eq!(page.query_all(&sel("input[id]")).len(), 1);
}

#[test]
fn selector_alternatives_keep_document_order() {
    let page = signup_page();
    let found = page.query_all(&sel("input[name=cpf], #email"));
    assert_eq!(found.len(), 2);
    assert_eq!(page.attr(found[0], "id").as_deref(), Some("email"));
    assert_eq!(page.attr(found[1], "name").as_deref(), Some("cpf"));
}

#[test]
fn selector_nth_of_type() {
    let page = signup_page();
    let second = page.query_all(&sel("form > div > input:nth-of-type(2)"));
    assert_eq!(second.len(), 1);
}

#[test]
fn selector_rejects_malformed_input() {
    for bad in ["", "div >", "input:hover", "[name", "input[name=\"x]", "a,"] {
        assert!(Selector::parse(bad).is_err(), "expected '{}' to be rejected", bad);
    }
}

// ============================================================================
// css_path
// ============================================================================

#[test]
fn css_path_prefers_unique_id_then_name() {
    let page = signup_page();
    let email = page.query_one(&sel("#email")).unwrap();
    let cpf = page.query_one(&sel("input[name=cpf]")).unwrap();

    assert_eq!(page.css_path(email), "#email");
    assert_eq!(page.css_path(cpf), "input[name=\"cpf\"]");
}

#[test]
fn css_path_falls_back_to_nth_of_type_chain_that_resolves_back() {
    let page = signup_page();
    let anonymous = page.query_all(&sel("form > div > input"));
    assert_eq!(anonymous.len(), 2);

    for id in anonymous {
        let path = page.css_path(id);
        assert!(path.starts_with("#app > "), "anchored at #app: {}", path);
        assert_eq!(page.query_one(&sel(&path)), Some(id), "path {}", path);
    }
}

#[test]
fn css_path_ignores_duplicate_ids() {
    let page = page_with([
        NodeSnapshot::new("input").attr("id", "dup"),
        NodeSnapshot::new("input").attr("id", "dup"),
    ]);
    let second = page.query_all(&sel("input"))[1];
    let path = page.css_path(second);
    assert_ne!(path, "#dup");
    assert_eq!(page.query_one(&sel(&path)), Some(second));
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn label_resolution_order() {
    let page = page_with([
        labelled("email", "E-mail:", input("email", "email")),
        NodeSnapshot::new("label").children([
            NodeSnapshot::new("span").text("Nome completo"),
            input("text", "nome"),
        ]),
        NodeSnapshot::new("span").attr("id", "cap").text("Cidade"),
        input("text", "c1").attr("aria-labelledby", "cap"),
        input("text", "c2").attr("aria-label", "Bairro"),
        input("text", "c3").attr("title", "Complemento"),
        NodeSnapshot::new("div").children([
            NodeSnapshot::new("span").text("Estado *"),
            input("text", "c4"),
        ]),
    ]);

    let label_of = |name: &str| {
        let id = page
            .query_one(&sel(&format!("input[name={}]", name)))
            .unwrap();
        find_label(&page, id)
    };

    assert_eq!(label_of("email").as_deref(), Some("E-mail"));
    assert_eq!(label_of("nome").as_deref(), Some("Nome completo"));
    assert_eq!(label_of("c1").as_deref(), Some("Cidade"));
    assert_eq!(label_of("c2").as_deref(), Some("Bairro"));
    assert_eq!(label_of("c3").as_deref(), Some("Complemento"));
    assert_eq!(label_of("c4").as_deref(), Some("Estado"));
}

#[test]
fn preceding_control_is_not_a_label() {
    let page = page_with([NodeSnapshot::new("div").children([
        input("text", "first"),
        input("text", "second"),
    ])]);
    let second = page.query_one(&sel("input[name=second]")).unwrap();
    assert_eq!(find_label(&page, second), None);
}

#[test]
fn clean_label_collapses_and_strips_decorations() {
    assert_eq!(clean_label("  Nome \n completo: * ").as_deref(), Some("Nome completo"));
    assert_eq!(clean_label(" :* "), None);
}

// ============================================================================
// Visibility
// ============================================================================

#[test]
fn visibility_follows_styles_hidden_and_rects() {
    let page = page_with([
        input("text", "shown"),
        input("text", "sized").rect(120.0, 30.0),
        input("text", "zero").rect(0.0, 0.0),
        input("text", "attr").attr("hidden", ""),
        NodeSnapshot::new("div")
            .attr("style", "display: none")
            .child(input("text", "nested")),
        input("text", "invisible").attr("style", "visibility:hidden"),
    ]);
    let visible = |name: &str| {
        let id = page
            .query_one(&sel(&format!("input[name={}]", name)))
            .unwrap();
        page.is_visible(id)
    };

    assert!(visible("shown"));
    assert!(visible("sized"));
    assert!(!visible("zero"));
    assert!(!visible("attr"));
    assert!(!visible("nested"));
    assert!(!visible("invisible"));
}

// ============================================================================
// Mutations and snapshots
// ============================================================================

#[test]
fn structural_changes_emit_mutation_records() {
    let page = Page::new("https://example.test");
    let mut mutations = page.subscribe_mutations();
    let root = page.root();

    let added = page.append_child(root, input("text", "late")).unwrap();
    let record = mutations.try_recv().unwrap();
    assert_eq!(record.target, root);
    assert_eq!(
        record.kind,
        MutationKind::ChildList {
            added: vec![added],
            removed: vec![]
        }
    );

    assert!(page.set_attribute(added, "placeholder", "CEP"));
    let record = mutations.try_recv().unwrap();
    assert_eq!(record.kind, MutationKind::Attributes { name: "placeholder".into() });

    // Property writes are not mutations.
    assert!(page.set_value(added, "01310-100"));
    assert!(matches!(mutations.try_recv(), Err(TryRecvError::Empty)));

    assert!(page.remove(added));
    let record = mutations.try_recv().unwrap();
    assert!(matches!(record.kind, MutationKind::ChildList { ref removed, .. } if removed == &vec![added]));
    assert!(!page.is_attached(added));
    assert!(page.query_all(&sel("input")).is_empty());
    assert!(!page.remove(added));
}

#[test]
fn removed_node_still_answers_is_within_through_its_old_parent() {
    let page = page_with([NodeSnapshot::new("div")
        .attr("data-form-sense-ui", "")
        .child(NodeSnapshot::new("span").text("toast"))]);
    let ui = sel("[data-form-sense-ui]");
    let span = page.query_one(&sel("span")).unwrap();

    page.remove(span);
    assert!(page.is_within(span, &ui));
    assert!(!page.matches(span, &ui));
}

#[test]
fn page_from_json_accepts_wrapped_and_bare_documents() {
    let wrapped = r#"{"url": "https://shop.test/checkout", "root": {"tag": "body", "children": [
        {"tag": "input", "attrs": {"type": "email", "name": "email"}}
    ]}}"#;
    let page = Page::from_json(wrapped).unwrap();
    assert_eq!(page.url(), "https://shop.test/checkout");
    assert_eq!(page.query_all(&sel("input[type=email]")).len(), 1);

    let bare = r#"{"tag": "body", "children": [{"tag": "select"}]}"#;
    let page = Page::from_json(bare).unwrap();
    assert_eq!(page.url(), "about:blank");
    assert_eq!(page.query_all(&sel("select")).len(), 1);

    assert!(Page::from_json("{not json").is_err());
}

#[test]
fn snapshot_reflects_property_writes() {
    let page = page_with([input("text", "cidade")]);
    let id = page.query_one(&sel("input")).unwrap();
    page.set_value(id, "Recife");

    let snapshot = page.snapshot();
    assert_eq!(snapshot.children[0].value.as_deref(), Some("Recife"));
}
