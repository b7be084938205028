use std::sync::Arc;

use async_trait::async_trait;
use form_sense::adapters::common::base_field;
use form_sense::adapters::{AdapterRegistry, AdapterTimings, AntdSelectAdapter, CustomAdapter};
use form_sense::dom::{DomEvent, NodeId, NodeSnapshot, Page, PageEvent, Selector};
use form_sense::error::FormError;
use form_sense::field::{CandidateField, FieldType};
use tokio::sync::broadcast::Receiver;

mod common;
use crate::common::pages::{antd_dropdown, antd_select, page_with, select2_widget};

fn sel(source: &str) -> Selector {
    Selector::parse(source).unwrap()
}

/// Claims every `.widget` and types it as `field_type`.
struct WidgetAdapter {
    name: &'static str,
    field_type: FieldType,
    selector: Selector,
}

impl WidgetAdapter {
    fn new(name: &'static str, field_type: FieldType) -> Self {
        WidgetAdapter {
            name,
            field_type,
            selector: sel(".widget"),
        }
    }
}

#[async_trait]
impl CustomAdapter for WidgetAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn selector(&self) -> &Selector {
        &self.selector
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        Ok(base_field(page, node, None, self.field_type))
    }

    async fn fill(&self, _page: &Page, _node: NodeId, _value: &str) -> Result<bool, FormError> {
        Err(FormError::missing(self.name, "anything"))
    }
}

fn registry() -> AdapterRegistry {
    AdapterRegistry::with_defaults(AdapterTimings::default())
}

/// Real antd marks its search input as a combobox too.
fn antd_select_with_combobox_input(caption: &str) -> NodeSnapshot {
    NodeSnapshot::new("div").children([
        NodeSnapshot::new("span").text(caption),
        NodeSnapshot::new("div").class("ant-select").child(
            NodeSnapshot::new("div").class("ant-select-selector").child(
                NodeSnapshot::new("input")
                    .attr("type", "search")
                    .attr("role", "combobox"),
            ),
        ),
    ])
}

fn antd_radio_group(name: &str, choices: &[(&str, &str)]) -> NodeSnapshot {
    NodeSnapshot::new("div").children([
        NodeSnapshot::new("span").text("Sexo"),
        NodeSnapshot::new("div")
            .class("ant-radio-group")
            .children(choices.iter().map(|(value, text)| {
                NodeSnapshot::new("label").class("ant-radio-wrapper").children([
                    NodeSnapshot::new("span").class("ant-radio").child(
                        NodeSnapshot::new("input")
                            .attr("type", "radio")
                            .attr("name", name)
                            .attr("value", value),
                    ),
                    NodeSnapshot::new("span").text(text),
                ])
            })),
    ])
}

/// Renders the antd dropdown the first time anything is pressed.
fn spawn_antd_overlay(page: Arc<Page>, options: &'static [&'static str]) {
    let mut events = page.subscribe_events();
    tokio::spawn(async move {
        while let Ok(PageEvent { event, .. }) = events.recv().await {
            if event == DomEvent::MouseDown {
                page.append_child(page.root(), antd_dropdown(options));
                break;
            }
        }
    });
}

fn drain(events: &mut Receiver<PageEvent>) -> Vec<PageEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn default_registry_order() {
    let names: Vec<&str> = registry().adapters().iter().map(|a| a.name()).collect();
    assert_eq!(
        names,
        vec![
            "antd-datepicker",
            "antd-select",
            "antd-radio-group",
            "mui-autocomplete",
            "mui-select",
            "select2",
            "react-select",
            "aria-combobox",
        ]
    );
}

#[test]
fn registering_a_taken_name_is_ignored() {
    let mut registry = registry();
    registry.register(Arc::new(AntdSelectAdapter::new(AdapterTimings::default())));
    assert_eq!(registry.adapters().len(), 8);
}

#[test]
fn first_registered_adapter_wins_a_shared_node() {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(WidgetAdapter::new("first", FieldType::Date)));
    registry.register(Arc::new(WidgetAdapter::new("second", FieldType::Select)));

    let page = page_with([
        NodeSnapshot::new("div").class("widget"),
        NodeSnapshot::new("div").class("widget"),
    ]);
    let fields = registry.detect_all(&page);

    assert_eq!(fields.len(), 2);
    assert!(fields.iter().all(|f| f.adapter_name.as_deref() == Some("first")));
    assert!(fields.iter().all(|f| f.field_type == FieldType::Date));
}

#[test]
fn each_widget_is_claimed_once() {
    let page = page_with([
        antd_select_with_combobox_input("UF"),
        NodeSnapshot::new("div")
            .attr("role", "combobox")
            .attr("aria-label", "Cidade"),
        select2_widget("estado", "Estado", &[("SP", "São Paulo")]),
    ]);
    let fields = registry().detect_all(&page);

    let adapters: Vec<&str> = fields
        .iter()
        .map(|f| f.adapter_name.as_deref().unwrap())
        .collect();
    assert_eq!(adapters, vec!["antd-select", "select2", "aria-combobox"]);

    let mut elements: Vec<_> = fields.iter().map(|f| f.element).collect();
    elements.dedup();
    assert_eq!(elements.len(), 3);
}

#[test]
fn hidden_widgets_are_not_claimed() {
    let page = page_with([NodeSnapshot::new("div")
        .attr("style", "display:none")
        .child(antd_select("UF"))]);
    assert!(registry().detect_all(&page).is_empty());
}

#[test]
fn nested_react_select_parts_yield_one_field() {
    let page = page_with([NodeSnapshot::new("div").children([
        NodeSnapshot::new("span").text("Cidade"),
        NodeSnapshot::new("div").class("react-select-container").child(
            NodeSnapshot::new("div").class("react-select__control").child(
                NodeSnapshot::new("div")
                    .class("react-select__value-container")
                    .child(NodeSnapshot::new("input").attr("id", "react-select-3-input")),
            ),
        ),
    ])]);

    let fields = registry().detect_all(&page);
    assert_eq!(fields.len(), 1);
    let field = &fields[0];
    assert_eq!(field.adapter_name.as_deref(), Some("react-select"));
    assert_eq!(field.label.as_deref(), Some("Cidade"));
    assert_eq!(field.id, None);
    assert_eq!(field.field_type, FieldType::Select);
}

#[test]
fn select2_field_takes_label_and_options_from_the_source_select() {
    let page = page_with([select2_widget(
        "estado",
        "Estado",
        &[("SP", "São Paulo"), ("PR", "Paraná")],
    )]);
    let fields = registry().detect_all(&page);

    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].label.as_deref(), Some("Estado"));
    assert_eq!(fields[0].options.len(), 2);
    assert_eq!(fields[0].options[1].value, "PR");
}

// ============================================================================
// Filling
// ============================================================================

#[tokio::test]
async fn antd_select_fill_picks_from_the_dropdown() {
    let page = Arc::new(page_with([antd_select("Estado")]));
    let field = registry().detect_all(&page).remove(0);
    let mut events = page.subscribe_events();
    spawn_antd_overlay(page.clone(), &["São Paulo", "Paraná", "Bahia"]);

    assert!(registry().fill(&page, &field, "Paraná").await);

    let clicked: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| e.event == DomEvent::Click)
        .collect();
    assert_eq!(clicked.len(), 1);
    assert_eq!(page.attr(clicked[0].target, "title").as_deref(), Some("Paraná"));
}

#[tokio::test]
async fn antd_select_fill_takes_first_option_when_nothing_matches() {
    let page = Arc::new(page_with([antd_select("Estado")]));
    let field = registry().detect_all(&page).remove(0);
    let mut events = page.subscribe_events();
    spawn_antd_overlay(page.clone(), &["Bahia", "Ceará"]);

    assert!(registry().fill(&page, &field, "Tocantins").await);

    let clicked = drain(&mut events)
        .into_iter()
        .find(|e| e.event == DomEvent::Click)
        .unwrap();
    assert_eq!(page.attr(clicked.target, "title").as_deref(), Some("Bahia"));
}

#[tokio::test(start_paused = true)]
async fn antd_select_fill_times_out_without_overlay() {
    let page = page_with([antd_select("Estado")]);
    let field = registry().detect_all(&page).remove(0);

    let started = tokio::time::Instant::now();
    assert!(!registry().fill(&page, &field, "Paraná").await);
    assert!(started.elapsed() >= AdapterTimings::default().overlay_timeout);
}

#[tokio::test]
async fn fill_without_a_known_adapter_or_node_is_false() {
    let page = page_with([antd_select("Estado")]);
    let registry = registry();

    let mut field = registry.detect_all(&page).remove(0);
    field.adapter_name = Some("kendo-combobox".into());
    assert!(!registry.fill(&page, &field, "x").await);

    let wrapper = page.query_one(&sel(".ant-select")).unwrap();
    let mut gone = CandidateField::new(wrapper, "#nowhere", "div");
    gone.adapter_name = Some("antd-select".into());
    page.remove(wrapper);
    assert!(!registry.fill(&page, &gone, "x").await);
}

#[tokio::test]
async fn adapter_errors_become_false() {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(WidgetAdapter::new("broken", FieldType::Select)));
    let page = page_with([NodeSnapshot::new("div").class("widget")]);

    let field = registry.detect_all(&page).remove(0);
    assert!(!registry.fill(&page, &field, "x").await);
}

#[tokio::test]
async fn select2_fill_goes_through_the_source_select() {
    let page = page_with([select2_widget(
        "estado",
        "Estado",
        &[("SP", "São Paulo"), ("PR", "Paraná")],
    )]);
    let field = registry().detect_all(&page).remove(0);
    let mut events = page.subscribe_events();

    assert!(registry().fill(&page, &field, "Paraná").await);

    let source = page.query_one(&sel("select#estado")).unwrap();
    assert_eq!(page.value(source).as_deref(), Some("PR"));
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| e.target == source && e.event == DomEvent::Change)
    );
}

#[tokio::test]
async fn antd_radio_group_fill_checks_one_choice() {
    let page = page_with([antd_radio_group("sexo", &[("f", "Feminino"), ("m", "Masculino")])]);
    let field = registry().detect_all(&page).remove(0);
    assert_eq!(field.field_type, FieldType::Radio);
    assert_eq!(field.name.as_deref(), Some("sexo"));
    assert_eq!(field.options.len(), 2);
    assert_eq!(field.options[0].value, "f");

    let radio = |value: &str| {
        page.query_one(&sel(&format!("input[value={}]", value)))
            .unwrap()
    };

    assert!(registry().fill(&page, &field, "Masculino").await);
    assert!(page.is_checked(radio("m")));
    assert!(!page.is_checked(radio("f")));

    assert!(registry().fill(&page, &field, "f").await);
    assert!(page.is_checked(radio("f")));
    assert!(!page.is_checked(radio("m")));
}
