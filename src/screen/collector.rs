use std::collections::HashSet;

use async_stream::stream;
use futures::Stream;
use once_cell::sync::Lazy;

use crate::classifier::DetectionPipeline;
use crate::dom::label::{clean_label, find_label};
use crate::dom::{NodeId, Page, Selector};
use crate::field::{CandidateField, FieldOption};

static FILLABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input, select, textarea").expect("static selector"));

static OPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("option").expect("static selector"));

/// Containers whose controls belong to a custom adapter, not to the collector.
pub const CUSTOM_WIDGET_CONTAINERS: &str = concat!(
    ".ant-select, .ant-picker, .ant-radio-group, ",
    ".MuiAutocomplete-root, .MuiSelect-nativeInput, ",
    ".select2-container, .select2-hidden-accessible, ",
    "[class*=\"react-select\"], input[id^=\"react-select-\"], ",
    "[role=\"combobox\"]"
);

static CUSTOM_CONTAINERS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(CUSTOM_WIDGET_CONTAINERS).expect("static selector"));

/// A native control a user can type into or pick from.
pub fn is_fillable(page: &Page, id: NodeId) -> bool {
    let Some(node) = page.node(id) else {
        return false;
    };
    if !matches!(node.tag.as_str(), "input" | "textarea" | "select") {
        return false;
    }
    if node.attr("disabled").is_some() {
        return false;
    }
    if node.tag != "input" {
        return true;
    }

    let input_type = node.attr("type").map(str::to_lowercase);
    match input_type.as_deref() {
        // Textual inputs
        None
        | Some("")
        | Some("text")
        | Some("email")
        | Some("password")
        | Some("search")
        | Some("number")
        | Some("tel")
        | Some("url")
        | Some("date")
        | Some("datetime-local")
        | Some("time")
        | Some("month")
        | Some("week")
        | Some("range")
        | Some("color")

        // Choice inputs
        | Some("radio")
        | Some("checkbox") => true,

        // Explicit non-inputs
        Some("submit")
        | Some("button")
        | Some("reset")
        | Some("image")
        | Some("hidden")
        | Some("file") => false,

        // Unknown → be conservative
        _ => false,
    }
}

/// Inside (or itself) a known custom-widget container.
pub fn is_inside_custom_widget(page: &Page, id: NodeId) -> bool {
    page.closest(id, &CUSTOM_CONTAINERS).is_some()
}

/// Bare, unclassified field for one native control.
pub fn build_native_field(page: &Page, id: NodeId) -> Option<CandidateField> {
    let node = page.node(id)?;
    let mut field = CandidateField::new(id, &page.css_path(id), &node.tag);

    if node.tag == "input" {
        let input_type = node.attr("type").filter(|t| !t.is_empty()).unwrap_or("text");
        field.input_type = Some(input_type.to_lowercase());
    }

    field.label = find_label(page, id);
    field.name = non_blank(node.attr("name"));
    field.id = non_blank(node.attr("id"));
    field.placeholder = non_blank(node.attr("placeholder"));
    field.autocomplete = non_blank(node.attr("autocomplete"))
        .filter(|a| !matches!(a.to_lowercase().as_str(), "on" | "off"));
    field.required = node.attr("required").is_some()
        || node.attr("aria-required").is_some_and(|v| v == "true");

    if node.tag == "select" {
        field.options = page
            .query_all_within(id, &OPTION)
            .into_iter()
            .filter_map(|opt| {
                let text = clean_label(&page.text_content(opt)).unwrap_or_default();
                let value = page.attr(opt, "value").unwrap_or_else(|| text.clone());
                (!value.is_empty() || !text.is_empty()).then_some(FieldOption { value, text })
            })
            .collect();
    }

    field.refresh_signals();
    Some(field)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Every fillable, visible native control outside custom widgets, in
/// document order, with `field_type = unknown`.
pub fn collect_native_fields(page: &Page) -> Vec<CandidateField> {
    page.query_all(&FILLABLE)
        .into_iter()
        .filter(|id| is_fillable(page, *id))
        .filter(|id| !is_inside_custom_widget(page, *id))
        .filter(|id| page.is_visible(*id))
        .filter_map(|id| build_native_field(page, id))
        .collect()
}

/// Collect and classify synchronously (the oracle abstains).
pub fn detect_native_fields(page: &Page, pipeline: &DetectionPipeline) -> Vec<CandidateField> {
    let mut fields = collect_native_fields(page);
    for field in &mut fields {
        pipeline.run(field);
    }
    fields
}

/// Collect and classify with the full chain.
pub async fn detect_native_fields_async(
    page: &Page,
    pipeline: &DetectionPipeline,
) -> Vec<CandidateField> {
    let mut fields = collect_native_fields(page);
    for field in &mut fields {
        pipeline.run_async(field).await;
    }
    fields
}

/// Yield each native field as soon as it is classified, in document order.
pub fn stream_native_fields<'a>(
    page: &'a Page,
    pipeline: &'a DetectionPipeline,
) -> impl Stream<Item = CandidateField> + 'a {
    stream! {
        let mut seen: HashSet<NodeId> = HashSet::new();
        for mut field in collect_native_fields(page) {
            if !seen.insert(field.element) {
                continue;
            }
            pipeline.run_async(&mut field).await;
            yield field;
        }
    }
}
