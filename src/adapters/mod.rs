use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dom::{NodeId, Page, Selector};
use crate::error::FormError;
use crate::field::CandidateField;

pub mod antd;
pub mod aria;
pub mod common;
pub mod mui;
pub mod react_select;
pub mod select2;

pub use antd::{AntdDatePickerAdapter, AntdRadioGroupAdapter, AntdSelectAdapter};
pub use aria::AriaComboboxAdapter;
pub use mui::{MuiAutocompleteAdapter, MuiSelectAdapter};
pub use react_select::ReactSelectAdapter;
pub use select2::Select2Adapter;

/// Detection and fill logic for one third-party widget family.
#[async_trait]
pub trait CustomAdapter: Send + Sync {
    /// Unique registry key, recorded on the fields this adapter builds.
    fn name(&self) -> &'static str;

    /// Candidate wrappers.
    fn selector(&self) -> &Selector;

    /// Cheap, idempotent confirmation that a candidate really is this widget.
    fn matches(&self, _page: &Page, _node: NodeId) -> bool {
        true
    }

    fn build_field(&self, page: &Page, node: NodeId) -> Result<CandidateField, FormError>;

    /// Drive the widget to `value`. `Ok(false)` when the widget did not
    /// respond within its timeout.
    async fn fill(&self, page: &Page, node: NodeId, value: &str) -> Result<bool, FormError>;
}

/// Bounds for waiting on overlays that a framework renders after a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterTimings {
    pub overlay_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for AdapterTimings {
    fn default() -> Self {
        Self {
            overlay_timeout: Duration::from_millis(1500),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Adapters in priority order. The first adapter to claim a node owns it.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn CustomAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in adapters, most specific first.
    pub fn with_defaults(timings: AdapterTimings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AntdDatePickerAdapter::new()));
        registry.register(Arc::new(AntdSelectAdapter::new(timings)));
        registry.register(Arc::new(AntdRadioGroupAdapter::new()));
        registry.register(Arc::new(MuiAutocompleteAdapter::new(timings)));
        registry.register(Arc::new(MuiSelectAdapter::new(timings)));
        registry.register(Arc::new(Select2Adapter::new(timings)));
        registry.register(Arc::new(ReactSelectAdapter::new(timings)));
        registry.register(Arc::new(AriaComboboxAdapter::new(timings)));
        registry
    }

    /// Append an adapter. A second adapter with an existing name is ignored.
    pub fn register(&mut self, adapter: Arc<dyn CustomAdapter>) {
        if self.get_adapter(adapter.name()).is_some() {
            warn!(adapter = adapter.name(), "adapter already registered, ignored");
            return;
        }
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn CustomAdapter>] {
        &self.adapters
    }

    pub fn get_adapter(&self, name: &str) -> Option<Arc<dyn CustomAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// One field per claimed wrapper. The claim set lives only for this scan
    /// and is keyed by node identity; nothing is written onto the page.
    pub fn detect_all(&self, page: &Page) -> Vec<CandidateField> {
        let mut claimed: HashSet<NodeId> = HashSet::new();
        let mut fields = Vec::new();

        for adapter in &self.adapters {
            for node in page.query_all(adapter.selector()) {
                if claimed.contains(&node) || claimed.iter().any(|c| page.contains(*c, node)) {
                    continue;
                }
                if !page.is_visible(node) || !adapter.matches(page, node) {
                    continue;
                }
                claimed.insert(node);

                match adapter.build_field(page, node) {
                    Ok(mut field) => {
                        field.adapter_name = Some(adapter.name().to_string());
                        debug!(adapter = adapter.name(), selector = %field.selector, "custom widget detected");
                        fields.push(field);
                    }
                    Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter failed to build field"),
                }
            }
        }

        fields
    }

    /// Fill an adapter-built field. Never fails: unknown adapters, vanished
    /// nodes, adapter errors and overlay timeouts all give `false`.
    pub async fn fill(&self, page: &Page, field: &CandidateField, value: &str) -> bool {
        let Some(adapter) = field.adapter_name.as_deref().and_then(|n| self.get_adapter(n)) else {
            debug!(selector = %field.selector, "no adapter for field");
            return false;
        };

        let Some(node) = resolve_node(page, field) else {
            debug!(adapter = adapter.name(), selector = %field.selector, "widget no longer on page");
            return false;
        };

        match adapter.fill(page, node, value).await {
            Ok(filled) => filled,
            Err(e) => {
                warn!(adapter = adapter.name(), error = %e, "adapter fill failed");
                false
            }
        }
    }
}

/// The field's node if still attached, else whatever its selector finds now.
pub fn resolve_node(page: &Page, field: &CandidateField) -> Option<NodeId> {
    if page.is_attached(field.element) {
        return Some(field.element);
    }
    let selector = Selector::parse(&field.selector).ok()?;
    page.query_one(&selector)
}
