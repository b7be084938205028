use std::sync::Arc;

use futures::Stream;
use tracing::info;

use crate::adapters::{AdapterRegistry, AdapterTimings};
use crate::classifier::{
    ClassifierSetting, DetectionPipeline, EXACT_TYPE, FALLBACK, FieldClassifier, StrategyKit,
    default_classifier_settings,
};
use crate::dom::Page;
use crate::field::CandidateField;
use crate::screen::collector::{detect_native_fields, detect_native_fields_async, stream_native_fields};
use crate::screen::reconcile::{reconcile, reconcile_async};

/// Whole-page detection: native controls through the pipeline, custom
/// widgets through the adapter registry, merged by reconciliation.
pub struct FieldDetector {
    kit: StrategyKit,
    pipeline: DetectionPipeline,
    registry: AdapterRegistry,
}

impl FieldDetector {
    pub fn new(kit: StrategyKit, settings: &[ClassifierSetting], registry: AdapterRegistry) -> Self {
        let pipeline = DetectionPipeline::new(&kit, settings);
        Self {
            kit,
            pipeline,
            registry,
        }
    }

    /// Rule-based strategies only, built-in adapters, default timings.
    pub fn with_defaults() -> Self {
        Self::new(
            StrategyKit::default(),
            &default_classifier_settings(),
            AdapterRegistry::with_defaults(AdapterTimings::default()),
        )
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn kit(&self) -> &StrategyKit {
        &self.kit
    }

    /// Load the similarity model and learned vectors so sync passes can use
    /// them. Returns `false` when no model is configured or it failed to load.
    pub async fn prepare(&self) -> bool {
        match &self.kit.similarity {
            Some(similarity) => similarity.ensure_loaded().await,
            None => false,
        }
    }

    /// Sync pass; the oracle does not take part. Similarity only answers
    /// once `prepare` (or an async pass) has loaded its model.
    pub fn detect_all_sync(&self, page: &Page) -> Vec<CandidateField> {
        let native = detect_native_fields(page, &self.pipeline);
        let custom = self.registry.detect_all(page);
        let fields = reconcile(page, native, custom, &self.kit.keyword);
        info!(url = page.url(), count = fields.len(), "fields detected");
        fields
    }

    pub async fn detect_all(&self, page: &Page) -> Vec<CandidateField> {
        let native = detect_native_fields_async(page, &self.pipeline).await;
        let custom = self.registry.detect_all(page);
        let fields = reconcile_async(page, native, custom, &self.custom_chain()).await;
        info!(url = page.url(), count = fields.len(), "fields detected");
        fields
    }

    pub fn stream_native<'a>(&'a self, page: &'a Page) -> impl Stream<Item = CandidateField> + 'a {
        stream_native_fields(page, &self.pipeline)
    }

    /// Active strategies that can say something about a custom widget: the
    /// native-type rules have nothing to read there.
    fn custom_chain(&self) -> Vec<Arc<dyn FieldClassifier>> {
        self.pipeline
            .active_classifiers()
            .into_iter()
            .filter(|c| c.name() != EXACT_TYPE && c.name() != FALLBACK)
            .collect()
    }
}
