use once_cell::sync::Lazy;
use tokio::time::{Instant, sleep};

use crate::adapters::AdapterTimings;
use crate::dom::label::{clean_label, find_label};
use crate::dom::{DomEvent, NodeId, Page, Selector};
use crate::field::{CandidateField, FieldOption, FieldType};

pub(crate) fn static_selector(source: &str) -> Selector {
    Selector::parse(source).expect("static selector")
}

static PLACEHOLDER_TEXT: Lazy<Selector> = Lazy::new(|| static_selector("[class*=\"placeholder\"]"));

/// Label of a widget: the wrapper's own label, then the inner control's,
/// then a placeholder-looking text inside the wrapper.
pub fn widget_label(page: &Page, wrapper: NodeId, inner: Option<NodeId>) -> Option<String> {
    find_label(page, wrapper)
        .or_else(|| inner.and_then(|i| find_label(page, i)))
        .or_else(|| {
            page.query_one_within(wrapper, &PLACEHOLDER_TEXT)
                .and_then(|p| clean_label(&page.text_content(p)))
        })
}

/// Field for a claimed wrapper. Name, id and placeholder come from the
/// inner control when there is one.
pub fn base_field(
    page: &Page,
    wrapper: NodeId,
    inner: Option<NodeId>,
    field_type: FieldType,
) -> CandidateField {
    let tag = page.tag(wrapper).unwrap_or_default();
    let mut field = CandidateField::new(wrapper, &page.css_path(wrapper), &tag).with_type(field_type);

    let source = inner.unwrap_or(wrapper);
    let attr = |name: &str| {
        page.attr(source, name)
            .or_else(|| page.attr(wrapper, name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    field.label = widget_label(page, wrapper, inner);
    field.name = attr("name");
    field.id = attr("id");
    field.placeholder = attr("placeholder");
    field.required = attr("required").is_some() || attr("aria-required").is_some_and(|v| v == "true");
    field.refresh_signals();
    field
}

/// Options rendered as nodes: value from `value`/`data-value`/`title`, text from content.
pub fn options_from_nodes(page: &Page, nodes: &[NodeId]) -> Vec<FieldOption> {
    nodes
        .iter()
        .filter_map(|n| {
            let text = clean_label(&page.text_content(*n)).unwrap_or_default();
            let value = option_value(page, *n).unwrap_or_else(|| text.clone());
            (!text.is_empty() || !value.is_empty()).then_some(FieldOption { value, text })
        })
        .collect()
}

fn option_value(page: &Page, node: NodeId) -> Option<String> {
    ["value", "data-value", "title"]
        .iter()
        .find_map(|a| page.attr(node, a))
}

/// Visible matches of `selector` (inside `scope` when given), polled until
/// something shows up or the overlay timeout elapses.
pub async fn wait_for_nodes(
    page: &Page,
    selector: &Selector,
    scope: Option<NodeId>,
    timings: &AdapterTimings,
) -> Option<Vec<NodeId>> {
    let deadline = Instant::now() + timings.overlay_timeout;
    loop {
        let found: Vec<NodeId> = match scope {
            Some(scope) => page.query_all_within(scope, selector),
            None => page.query_all(selector),
        }
        .into_iter()
        .filter(|n| page.is_visible(*n))
        .collect();

        if !found.is_empty() {
            return Some(found);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(timings.poll_interval).await;
    }
}

/// Best option for `value`: exact text or value, then a containing text,
/// then the first enabled option.
pub fn pick_option(page: &Page, options: &[NodeId], value: &str) -> Option<NodeId> {
    let wanted = value.trim().to_lowercase();
    let enabled: Vec<NodeId> = options
        .iter()
        .copied()
        .filter(|o| {
            page.attr(*o, "aria-disabled").as_deref() != Some("true")
                && page.attr(*o, "disabled").is_none()
        })
        .collect();

    let text_of = |o: NodeId| page.text_content(o).trim().to_lowercase();

    if !wanted.is_empty() {
        let exact = enabled.iter().copied().find(|o| {
            text_of(*o) == wanted
                || option_value(page, *o).is_some_and(|v| v.trim().to_lowercase() == wanted)
        });
        if exact.is_some() {
            return exact;
        }
        let partial = enabled.iter().copied().find(|o| {
            let text = text_of(*o);
            !text.is_empty() && (text.contains(&wanted) || wanted.contains(&text))
        });
        if partial.is_some() {
            return partial;
        }
    }

    enabled.first().copied()
}

/// Focus, write through the native setter, then announce the input.
pub fn type_into(page: &Page, input: NodeId, value: &str) {
    page.focus(input);
    page.set_value(input, value);
    page.dispatch(input, DomEvent::Input);
}

pub fn click(page: &Page, node: NodeId) {
    page.dispatch(node, DomEvent::MouseDown);
    page.dispatch(node, DomEvent::MouseUp);
    page.dispatch(node, DomEvent::Click);
}
