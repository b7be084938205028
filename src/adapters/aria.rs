use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::adapters::common::{base_field, click, pick_option, static_selector, type_into, wait_for_nodes};
use crate::adapters::{AdapterTimings, CustomAdapter};
use crate::dom::selector::quote_value;
use crate::dom::{NodeId, Page, Selector};
use crate::error::FormError;
use crate::field::{CandidateField, FieldType};

static COMBOBOX: Lazy<Selector> = Lazy::new(|| static_selector("[role=\"combobox\"]"));
static OPTION: Lazy<Selector> = Lazy::new(|| static_selector("[role=\"option\"]"));
static ANY_LISTBOX_OPTION: Lazy<Selector> =
    Lazy::new(|| static_selector("[role=\"listbox\"] [role=\"option\"]"));

/// Generic WAI-ARIA combobox, the catch-all for frameworks without a
/// dedicated adapter. Registered last.
pub struct AriaComboboxAdapter {
    timings: AdapterTimings,
}

impl AriaComboboxAdapter {
    pub fn new(timings: AdapterTimings) -> Self {
        Self { timings }
    }

    /// The listbox this combobox controls, when it names one.
    fn controlled_listbox(page: &Page, node: NodeId) -> Option<NodeId> {
        let id = page
            .attr(node, "aria-controls")
            .or_else(|| page.attr(node, "aria-owns"))
            .filter(|v| !v.trim().is_empty())?;
        let selector = Selector::parse(&format!("[id={}]", quote_value(id.trim()))).ok()?;
        page.query_one(&selector)
    }
}

#[async_trait]
impl CustomAdapter for AriaComboboxAdapter {
    fn name(&self) -> &'static str {
        "aria-combobox"
    }

    fn selector(&self) -> &Selector {
        &COMBOBOX
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.tag(node).as_deref() != Some("select") && page.attr(node, "disabled").is_none()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        Ok(base_field(page, node, None, FieldType::Select))
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        if page.tag(node).as_deref() == Some("input") {
            type_into(page, node, value);
        } else {
            page.focus(node);
            click(page, node);
        }

        let found = match Self::controlled_listbox(page, node) {
            Some(listbox) => wait_for_nodes(page, &OPTION, Some(listbox), &self.timings).await,
            None => wait_for_nodes(page, &ANY_LISTBOX_OPTION, None, &self.timings).await,
        };
        let Some(options) = found else {
            return Ok(false);
        };
        let Some(option) = pick_option(page, &options, value) else {
            return Ok(false);
        };
        click(page, option);
        Ok(true)
    }
}
