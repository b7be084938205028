use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{
    ClassifierResult, EXACT_TYPE, ExactTypeClassifier, FALLBACK, FallbackClassifier,
    FieldClassifier, KEYWORD, KeywordClassifier, ORACLE, OracleClassifier, SIMILARITY,
    SimilarityClassifier,
};
use crate::field::{CandidateField, DetectionMethod, FieldType};

/// Outcome of one pipeline run, also written onto the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub field_type: FieldType,
    pub method: DetectionMethod,
    pub confidence: f32,
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierSetting {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ClassifierSetting {
    pub fn enabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
        }
    }

    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
        }
    }
}

/// exact-type, keyword, similarity, oracle, html-fallback; all enabled.
pub fn default_classifier_settings() -> Vec<ClassifierSetting> {
    [EXACT_TYPE, KEYWORD, SIMILARITY, ORACLE, FALLBACK]
        .into_iter()
        .map(ClassifierSetting::enabled)
        .collect()
}

// ============================================================================
// Strategy kit
// ============================================================================

/// Every strategy instance available to a pipeline. Similarity and oracle are
/// optional collaborators; the rule-based ones are always present.
#[derive(Clone)]
pub struct StrategyKit {
    pub exact: Arc<ExactTypeClassifier>,
    pub keyword: Arc<KeywordClassifier>,
    pub similarity: Option<Arc<SimilarityClassifier>>,
    pub oracle: Option<Arc<OracleClassifier>>,
    pub fallback: Arc<FallbackClassifier>,
}

impl Default for StrategyKit {
    fn default() -> Self {
        Self {
            exact: Arc::new(ExactTypeClassifier),
            keyword: Arc::new(KeywordClassifier),
            similarity: None,
            oracle: None,
            fallback: Arc::new(FallbackClassifier),
        }
    }
}

impl StrategyKit {
    pub fn with_similarity(mut self, similarity: Arc<SimilarityClassifier>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<OracleClassifier>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn FieldClassifier>> {
        match name {
            EXACT_TYPE => Some(self.exact.clone() as Arc<dyn FieldClassifier>),
            KEYWORD => Some(self.keyword.clone() as Arc<dyn FieldClassifier>),
            SIMILARITY => self
                .similarity
                .clone()
                .map(|s| s as Arc<dyn FieldClassifier>),
            ORACLE => self.oracle.clone().map(|o| o as Arc<dyn FieldClassifier>),
            FALLBACK => Some(self.fallback.clone() as Arc<dyn FieldClassifier>),
            _ => None,
        }
    }

    pub fn fallback(&self) -> Arc<dyn FieldClassifier> {
        self.fallback.clone()
    }
}

/// Enabled strategies in settings order, unknown or unavailable names
/// skipped, duplicates dropped, fallback last and exactly once.
pub fn build_classifiers_from_settings(
    kit: &StrategyKit,
    settings: &[ClassifierSetting],
) -> Vec<Arc<dyn FieldClassifier>> {
    let mut out: Vec<Arc<dyn FieldClassifier>> = Vec::new();

    for setting in settings.iter().filter(|s| s.enabled) {
        if out.iter().any(|c| c.name() == setting.name) {
            continue;
        }
        match kit.by_name(&setting.name) {
            Some(classifier) => out.push(classifier),
            None => debug!(name = %setting.name, "classifier not available, skipped"),
        }
    }

    with_terminal_fallback(out, kit.fallback())
}

fn with_terminal_fallback(
    mut classifiers: Vec<Arc<dyn FieldClassifier>>,
    fallback: Arc<dyn FieldClassifier>,
) -> Vec<Arc<dyn FieldClassifier>> {
    let existing = classifiers
        .iter()
        .position(|c| c.name() == FALLBACK)
        .map(|idx| classifiers.remove(idx));
    classifiers.retain(|c| c.name() != FALLBACK);
    classifiers.push(existing.unwrap_or(fallback));
    classifiers
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered strategy chain with early exit on the first non-`unknown` answer.
pub struct DetectionPipeline {
    active: RwLock<Vec<Arc<dyn FieldClassifier>>>,
    fallback: Arc<dyn FieldClassifier>,
}

impl DetectionPipeline {
    pub fn new(kit: &StrategyKit, settings: &[ClassifierSetting]) -> Self {
        Self {
            active: RwLock::new(build_classifiers_from_settings(kit, settings)),
            fallback: kit.fallback(),
        }
    }

    pub fn active_classifiers(&self) -> Vec<Arc<dyn FieldClassifier>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the chain; the fallback is appended if the list lacks it.
    pub fn set_active_classifiers(&self, classifiers: Vec<Arc<dyn FieldClassifier>>) {
        let classifiers = with_terminal_fallback(classifiers, self.fallback.clone());
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = classifiers;
    }

    pub fn rebuild(&self, kit: &StrategyKit, settings: &[ClassifierSetting]) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) =
            build_classifiers_from_settings(kit, settings);
    }

    /// Synchronous run; async-only strategies (the oracle) abstain.
    pub fn run(&self, field: &mut CandidateField) -> Detection {
        let started = Instant::now();
        let mut last: Option<ClassifierResult> = None;

        for classifier in self.active_classifiers() {
            if let Some(result) = classifier.detect(field) {
                let concrete = result.field_type != FieldType::Unknown;
                last = Some(result);
                if concrete {
                    break;
                }
            }
        }

        self.finish(field, last, started)
    }

    /// Full chain, oracle included.
    pub async fn run_async(&self, field: &mut CandidateField) -> Detection {
        let started = Instant::now();
        let mut last: Option<ClassifierResult> = None;

        for classifier in self.active_classifiers() {
            if let Some(result) = classifier.detect_async(field).await {
                let concrete = result.field_type != FieldType::Unknown;
                last = Some(result);
                if concrete {
                    break;
                }
            }
        }

        self.finish(field, last, started)
    }

    fn finish(
        &self,
        field: &mut CandidateField,
        result: Option<ClassifierResult>,
        started: Instant,
    ) -> Detection {
        // The fallback always answers; this only covers a hand-built chain
        // whose fallback was swapped for something that abstains.
        let result = result.unwrap_or_else(|| {
            ClassifierResult::new(FieldType::Unknown, 0.1, DetectionMethod::HtmlFallback)
        });

        field.apply_detection(result.field_type, result.method, result.confidence);
        field.detection_duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            selector = %field.selector,
            field_type = %result.field_type,
            method = %result.method,
            confidence = result.confidence,
            "field classified"
        );

        Detection {
            field_type: result.field_type,
            method: result.method,
            confidence: result.confidence,
        }
    }
}
