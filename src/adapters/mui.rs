use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::adapters::common::{base_field, click, pick_option, static_selector, type_into, wait_for_nodes};
use crate::adapters::{AdapterTimings, CustomAdapter};
use crate::dom::label::find_label;
use crate::dom::{DomEvent, NodeId, Page, Selector};
use crate::error::FormError;
use crate::field::{CandidateField, FieldType};

static INPUT: Lazy<Selector> = Lazy::new(|| static_selector("input"));
static LISTBOX_OPTIONS: Lazy<Selector> =
    Lazy::new(|| static_selector("[role=\"listbox\"] [role=\"option\"]"));

// ============================================================================
// MUI Autocomplete
// ============================================================================

static AUTOCOMPLETE_ROOT: Lazy<Selector> = Lazy::new(|| static_selector(".MuiAutocomplete-root"));
static AUTOCOMPLETE_OPTIONS: Lazy<Selector> =
    Lazy::new(|| static_selector(".MuiAutocomplete-popper .MuiAutocomplete-option"));

/// `.MuiAutocomplete-root`: typing filters a popper listbox of options.
pub struct MuiAutocompleteAdapter {
    timings: AdapterTimings,
}

impl MuiAutocompleteAdapter {
    pub fn new(timings: AdapterTimings) -> Self {
        Self { timings }
    }
}

#[async_trait]
impl CustomAdapter for MuiAutocompleteAdapter {
    fn name(&self) -> &'static str {
        "mui-autocomplete"
    }

    fn selector(&self) -> &Selector {
        &AUTOCOMPLETE_ROOT
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &INPUT).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let input = page
            .query_one_within(node, &INPUT)
            .ok_or_else(|| FormError::missing(self.name(), "input"))?;
        Ok(base_field(page, node, Some(input), FieldType::Select))
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        let input = page
            .query_one_within(node, &INPUT)
            .ok_or_else(|| FormError::missing(self.name(), "input"))?;

        page.dispatch(input, DomEvent::MouseDown);
        type_into(page, input, value);

        let Some(options) = wait_for_nodes(page, &AUTOCOMPLETE_OPTIONS, None, &self.timings).await
        else {
            return Ok(false);
        };
        let Some(option) = pick_option(page, &options, value) else {
            return Ok(false);
        };
        click(page, option);
        page.dispatch(input, DomEvent::Blur);
        Ok(true)
    }
}

// ============================================================================
// MUI Select
// ============================================================================

static SELECT_ROOT: Lazy<Selector> = Lazy::new(|| static_selector(".MuiInputBase-root"));
static SELECT_TRIGGER: Lazy<Selector> = Lazy::new(|| static_selector(".MuiSelect-select"));
static NATIVE_INPUT: Lazy<Selector> = Lazy::new(|| static_selector(".MuiSelect-nativeInput"));

/// `.MuiInputBase-root` holding a `.MuiSelect-select` trigger; the menu is a
/// `role=listbox` rendered on mousedown.
pub struct MuiSelectAdapter {
    timings: AdapterTimings,
}

impl MuiSelectAdapter {
    pub fn new(timings: AdapterTimings) -> Self {
        Self { timings }
    }
}

#[async_trait]
impl CustomAdapter for MuiSelectAdapter {
    fn name(&self) -> &'static str {
        "mui-select"
    }

    fn selector(&self) -> &Selector {
        &SELECT_ROOT
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &SELECT_TRIGGER).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let native = page.query_one_within(node, &NATIVE_INPUT);
        let mut field = base_field(page, node, native, FieldType::Select);
        if field.label.is_none() {
            // MUI links its floating label through the trigger.
            if let Some(trigger) = page.query_one_within(node, &SELECT_TRIGGER) {
                field.label = find_label(page, trigger);
                field.refresh_signals();
            }
        }
        Ok(field)
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        let trigger = page
            .query_one_within(node, &SELECT_TRIGGER)
            .ok_or_else(|| FormError::missing(self.name(), ".MuiSelect-select"))?;

        page.dispatch(trigger, DomEvent::MouseDown);

        let Some(options) = wait_for_nodes(page, &LISTBOX_OPTIONS, None, &self.timings).await else {
            return Ok(false);
        };
        let Some(option) = pick_option(page, &options, value) else {
            return Ok(false);
        };
        click(page, option);
        Ok(true)
    }
}
