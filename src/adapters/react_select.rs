use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::adapters::common::{base_field, click, pick_option, static_selector, type_into, wait_for_nodes};
use crate::adapters::{AdapterTimings, CustomAdapter};
use crate::dom::{DomEvent, NodeId, Page, Selector};
use crate::error::FormError;
use crate::field::{CandidateField, FieldType};

static CONTAINER: Lazy<Selector> = Lazy::new(|| static_selector("[class*=\"react-select\"]"));
static INPUT: Lazy<Selector> = Lazy::new(|| static_selector("input[id^=\"react-select-\"]"));
static OPTIONS: Lazy<Selector> = Lazy::new(|| {
    static_selector("[id^=\"react-select-\"][id*=\"-option-\"], [class*=\"react-select__option\"]")
});

/// react-select: the outermost `react-select` element holding an
/// `input#react-select-N-input`; options appear as the user types.
pub struct ReactSelectAdapter {
    timings: AdapterTimings,
}

impl ReactSelectAdapter {
    pub fn new(timings: AdapterTimings) -> Self {
        Self { timings }
    }
}

#[async_trait]
impl CustomAdapter for ReactSelectAdapter {
    fn name(&self) -> &'static str {
        "react-select"
    }

    fn selector(&self) -> &Selector {
        &CONTAINER
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &INPUT).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let input = page
            .query_one_within(node, &INPUT)
            .ok_or_else(|| FormError::missing(self.name(), "react-select input"))?;

        let mut field = base_field(page, node, Some(input), FieldType::Select);
        // Generated ids ("react-select-3-input") say nothing about the field.
        if field.id.as_deref().is_some_and(|id| id.starts_with("react-select-")) {
            field.id = page.attr(node, "id").filter(|id| !id.is_empty());
            field.refresh_signals();
        }
        Ok(field)
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        let input = page
            .query_one_within(node, &INPUT)
            .ok_or_else(|| FormError::missing(self.name(), "react-select input"))?;

        page.dispatch(input, DomEvent::MouseDown);
        type_into(page, input, value);

        let Some(options) = wait_for_nodes(page, &OPTIONS, None, &self.timings).await else {
            return Ok(false);
        };
        let Some(option) = pick_option(page, &options, value) else {
            return Ok(false);
        };
        click(page, option);
        Ok(true)
    }
}
