use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::adapters::common::{base_field, click, pick_option, static_selector, wait_for_nodes};
use crate::adapters::{AdapterTimings, CustomAdapter};
use crate::dom::label::find_label;
use crate::dom::{DomEvent, NodeId, Page, Selector};
use crate::error::FormError;
use crate::field::{CandidateField, FieldOption, FieldType};

static CONTAINER: Lazy<Selector> = Lazy::new(|| static_selector(".select2-container"));
static SELECTION: Lazy<Selector> = Lazy::new(|| static_selector(".select2-selection"));
static RESULTS: Lazy<Selector> = Lazy::new(|| static_selector(".select2-results__option"));
static OPTION: Lazy<Selector> = Lazy::new(|| static_selector("option"));

/// jQuery select2: a hidden `<select>` followed by a `.select2-container`
/// that renders the selection.
pub struct Select2Adapter {
    timings: AdapterTimings,
}

impl Select2Adapter {
    pub fn new(timings: AdapterTimings) -> Self {
        Self { timings }
    }

    /// The original `<select>` select2 was attached to, if still present.
    fn source_select(page: &Page, container: NodeId) -> Option<NodeId> {
        let prev = page.previous_sibling(container)?;
        (page.tag(prev).as_deref() == Some("select")).then_some(prev)
    }
}

#[async_trait]
impl CustomAdapter for Select2Adapter {
    fn name(&self) -> &'static str {
        "select2"
    }

    fn selector(&self) -> &Selector {
        &CONTAINER
    }

    /// The open dropdown is also a `.select2-container`; only the one
    /// holding a selection box is the widget.
    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &SELECTION).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let select = Self::source_select(page, node);
        let mut field = base_field(page, node, select, FieldType::Select);

        if let Some(select) = select {
            if let Some(label) = find_label(page, select) {
                field.label = Some(label);
                field.refresh_signals();
            }
            field.options = page
                .query_all_within(select, &OPTION)
                .into_iter()
                .map(|o| {
                    let text = page.text_content(o).trim().to_string();
                    let value = page.attr(o, "value").unwrap_or_else(|| text.clone());
                    FieldOption { value, text }
                })
                .filter(|o| !o.value.is_empty() || !o.text.is_empty())
                .collect();
        }
        Ok(field)
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        // select2 mirrors the original select on `change`, so going through
        // it needs no overlay.
        if let Some(select) = Self::source_select(page, node) {
            let options = page.query_all_within(select, &OPTION);
            if let Some(option) = pick_option(page, &options, value) {
                let option_value = page
                    .attr(option, "value")
                    .unwrap_or_else(|| page.text_content(option).trim().to_string());
                page.set_value(select, &option_value);
                page.dispatch(select, DomEvent::Change);
                return Ok(true);
            }
            debug!(adapter = self.name(), "no matching option on source select, using dropdown");
        }

        let selection = page
            .query_one_within(node, &SELECTION)
            .ok_or_else(|| FormError::missing(self.name(), ".select2-selection"))?;
        page.dispatch(selection, DomEvent::MouseDown);

        let Some(results) = wait_for_nodes(page, &RESULTS, None, &self.timings).await else {
            return Ok(false);
        };
        let Some(option) = pick_option(page, &results, value) else {
            return Ok(false);
        };
        click(page, option);
        Ok(true)
    }
}
