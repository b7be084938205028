use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::adapters::common::{
    base_field, click, options_from_nodes, pick_option, static_selector, type_into, wait_for_nodes,
};
use crate::adapters::{AdapterTimings, CustomAdapter};
use crate::dom::{DomEvent, NodeId, Page, Selector};
use crate::error::FormError;
use crate::field::{CandidateField, FieldType};

static INPUT: Lazy<Selector> = Lazy::new(|| static_selector("input"));

// ============================================================================
// antd Select
// ============================================================================

static SELECT_WRAPPER: Lazy<Selector> = Lazy::new(|| static_selector(".ant-select"));
static SELECT_SELECTOR: Lazy<Selector> = Lazy::new(|| static_selector(".ant-select-selector"));
static SELECT_OPTIONS: Lazy<Selector> =
    Lazy::new(|| static_selector(".ant-select-dropdown .ant-select-item-option"));

/// `.ant-select`: opens on mousedown, renders `.ant-select-item-option`s
/// in a portal dropdown.
pub struct AntdSelectAdapter {
    timings: AdapterTimings,
}

impl AntdSelectAdapter {
    pub fn new(timings: AdapterTimings) -> Self {
        Self { timings }
    }
}

#[async_trait]
impl CustomAdapter for AntdSelectAdapter {
    fn name(&self) -> &'static str {
        "antd-select"
    }

    fn selector(&self) -> &Selector {
        &SELECT_WRAPPER
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &SELECT_SELECTOR).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let input = page.query_one_within(node, &INPUT);
        Ok(base_field(page, node, input, FieldType::Select))
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        let trigger = page
            .query_one_within(node, &SELECT_SELECTOR)
            .ok_or_else(|| FormError::missing(self.name(), ".ant-select-selector"))?;

        if let Some(input) = page.query_one_within(node, &INPUT) {
            page.focus(input);
        }
        page.dispatch(trigger, DomEvent::MouseDown);

        let Some(options) = wait_for_nodes(page, &SELECT_OPTIONS, None, &self.timings).await else {
            return Ok(false);
        };
        let Some(option) = pick_option(page, &options, value) else {
            return Ok(false);
        };
        click(page, option);
        Ok(true)
    }
}

// ============================================================================
// antd DatePicker
// ============================================================================

static PICKER_WRAPPER: Lazy<Selector> = Lazy::new(|| static_selector(".ant-picker"));

/// `.ant-picker`: accepts typed dates confirmed with Enter.
#[derive(Default)]
pub struct AntdDatePickerAdapter;

impl AntdDatePickerAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CustomAdapter for AntdDatePickerAdapter {
    fn name(&self) -> &'static str {
        "antd-datepicker"
    }

    fn selector(&self) -> &Selector {
        &PICKER_WRAPPER
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &INPUT).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let input = page
            .query_one_within(node, &INPUT)
            .ok_or_else(|| FormError::missing(self.name(), "input"))?;
        Ok(base_field(page, node, Some(input), FieldType::Date))
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        let input = page
            .query_one_within(node, &INPUT)
            .ok_or_else(|| FormError::missing(self.name(), "input"))?;

        page.dispatch(input, DomEvent::MouseDown);
        type_into(page, input, value);
        page.dispatch(input, DomEvent::KeyDown("Enter".into()));
        page.dispatch(input, DomEvent::Change);
        page.dispatch(input, DomEvent::Blur);
        Ok(true)
    }
}

// ============================================================================
// antd Radio.Group
// ============================================================================

static RADIO_GROUP: Lazy<Selector> = Lazy::new(|| static_selector(".ant-radio-group"));
static RADIO_WRAPPER: Lazy<Selector> = Lazy::new(|| static_selector(".ant-radio-wrapper"));

/// `.ant-radio-group` of `label.ant-radio-wrapper > ... > input[type=radio]`.
#[derive(Default)]
pub struct AntdRadioGroupAdapter;

impl AntdRadioGroupAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CustomAdapter for AntdRadioGroupAdapter {
    fn name(&self) -> &'static str {
        "antd-radio-group"
    }

    fn selector(&self) -> &Selector {
        &RADIO_GROUP
    }

    fn matches(&self, page: &Page, node: NodeId) -> bool {
        page.query_one_within(node, &RADIO_WRAPPER).is_some()
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError> {
        let choices = page.query_all_within(node, &RADIO_WRAPPER);

        // Each radio's wrapping label is a choice, not the question, so the
        // label comes from the group alone.
        let mut field = base_field(page, node, None, FieldType::Radio);
        if field.name.is_none() {
            field.name = page
                .query_one_within(node, &INPUT)
                .and_then(|i| page.attr(i, "name"))
                .filter(|n| !n.is_empty());
            field.refresh_signals();
        }

        field.options = options_from_nodes(page, &choices)
            .into_iter()
            .zip(&choices)
            .map(|(mut option, choice)| {
                if let Some(v) = page.query_one_within(*choice, &INPUT).and_then(|i| page.attr(i, "value")) {
                    option.value = v;
                }
                option
            })
            .collect();
        Ok(field)
    }

    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError> {
        let choices = page.query_all_within(node, &RADIO_WRAPPER);
        let inputs: Vec<NodeId> = choices
            .iter()
            .filter_map(|c| page.query_one_within(*c, &INPUT))
            .collect();

        let chosen = inputs
            .iter()
            .copied()
            .find(|i| page.attr(*i, "value").is_some_and(|v| v.eq_ignore_ascii_case(value.trim())))
            .or_else(|| {
                pick_option(page, &choices, value).and_then(|c| page.query_one_within(c, &INPUT))
            })
            .ok_or_else(|| FormError::missing(self.name(), "radio input"))?;

        for input in &inputs {
            page.set_checked(*input, *input == chosen);
        }
        click(page, chosen);
        page.dispatch(chosen, DomEvent::Change);
        Ok(true)
    }
}
