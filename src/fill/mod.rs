use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

use crate::adapters::common::pick_option;
use crate::adapters::resolve_node;
use crate::classifier::OracleClient;
use crate::dom::selector::quote_value;
use crate::dom::{DomEvent, NodeId, Page, Selector};
use crate::field::{CandidateField, FieldType};
use crate::screen::FieldDetector;

pub mod values;

pub use values::{
    FieldValueResolver, GeneratorResolver, ResolvedValue, SampleValueGenerator, ValueGenerator,
    ValueSource,
};

static OPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("option").expect("static selector"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillOutcome {
    pub selector: String,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    pub value: String,
    pub source: ValueSource,
    pub filled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillReport {
    pub outcomes: Vec<FillOutcome>,
}

impl FillReport {
    pub fn filled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.filled).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.filled_count()
    }
}

/// Resolves a value for each classified field and writes it into the page.
pub struct FormFiller {
    detector: Arc<FieldDetector>,
    resolver: Arc<dyn FieldValueResolver>,
    oracle: Option<Arc<dyn OracleClient>>,
    force_oracle_first: bool,
}

impl FormFiller {
    pub fn new(detector: Arc<FieldDetector>) -> Self {
        Self {
            detector,
            resolver: Arc::new(GeneratorResolver::default()),
            oracle: None,
            force_oracle_first: false,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FieldValueResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn OracleClient>, force_first: bool) -> Self {
        self.oracle = Some(oracle);
        self.force_oracle_first = force_first;
        self
    }

    pub fn detector(&self) -> &Arc<FieldDetector> {
        &self.detector
    }

    /// Detect everything on the page, then fill it.
    pub async fn fill_page(&self, page: &Page) -> FillReport {
        let fields = self.detector.detect_all(page).await;
        self.fill_fields(page, &fields).await
    }

    /// Fill the given fields in order. A field that cannot be filled is
    /// reported and skipped; the pass always completes.
    pub async fn fill_fields(&self, page: &Page, fields: &[CandidateField]) -> FillReport {
        let mut report = FillReport::default();

        for field in fields {
            let resolved = self
                .resolver
                .resolve(field, page.url(), self.oracle.as_deref(), self.force_oracle_first)
                .await;

            let filled = if field.is_custom() {
                self.detector
                    .registry()
                    .fill(page, field, &resolved.value)
                    .await
            } else {
                fill_native(page, field, &resolved.value)
            };

            debug!(selector = %field.selector, field_type = %field.field_type, filled, "field filled");
            report.outcomes.push(FillOutcome {
                selector: field.selector.clone(),
                field_type: field.field_type,
                adapter: field.adapter_name.clone(),
                value: resolved.value,
                source: resolved.source,
                filled,
            });
        }

        info!(
            url = page.url(),
            filled = report.filled_count(),
            skipped = report.skipped_count(),
            "fill pass complete"
        );
        report
    }
}

/// Write `value` into a native control the way a user's browser would:
/// focus, native setter, `input`/`change`, blur. Choice controls are
/// checked, selects resolved against their options.
pub fn fill_native(page: &Page, field: &CandidateField, value: &str) -> bool {
    let Some(node) = resolve_node(page, field) else {
        return false;
    };

    match (field.tag.as_str(), field.input_type.as_deref()) {
        ("select", _) => fill_select(page, node, value),
        ("input", Some("checkbox")) => {
            let checked = is_truthy(value);
            page.focus(node);
            page.set_checked(node, checked);
            page.dispatch(node, DomEvent::Click);
            page.dispatch(node, DomEvent::Change);
            true
        }
        ("input", Some("radio")) => {
            if let Some(name) = page.attr(node, "name").filter(|n| !n.is_empty()) {
                if let Ok(group) = Selector::parse(&format!("input[name={}]", quote_value(&name))) {
                    for other in page.query_all(&group) {
                        page.set_checked(other, false);
                    }
                }
            }
            page.focus(node);
            page.set_checked(node, true);
            page.dispatch(node, DomEvent::Click);
            page.dispatch(node, DomEvent::Change);
            true
        }
        _ => {
            page.focus(node);
            if !page.set_value(node, value) {
                return false;
            }
            page.dispatch(node, DomEvent::Input);
            page.dispatch(node, DomEvent::Change);
            page.dispatch(node, DomEvent::Blur);
            true
        }
    }
}

fn fill_select(page: &Page, node: NodeId, value: &str) -> bool {
    let options: Vec<NodeId> = page
        .query_all_within(node, &OPTION)
        .into_iter()
        .filter(|o| {
            let value = page.attr(*o, "value").unwrap_or_else(|| page.text_content(*o));
            !value.trim().is_empty()
        })
        .collect();

    let Some(option) = pick_option(page, &options, value) else {
        return false;
    };
    let option_value = page
        .attr(option, "value")
        .unwrap_or_else(|| page.text_content(option).trim().to_string());

    page.focus(node);
    page.set_value(node, &option_value);
    page.dispatch(node, DomEvent::Input);
    page.dispatch(node, DomEvent::Change);
    page.dispatch(node, DomEvent::Blur);
    true
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "sim" | "checked"
    )
}
