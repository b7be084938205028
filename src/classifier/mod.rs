use async_trait::async_trait;

use crate::field::{CandidateField, DetectionMethod, FieldType};

pub mod exact_type;
pub mod fallback;
pub mod keyword;
pub mod learned;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod similarity;

pub use exact_type::ExactTypeClassifier;
pub use fallback::FallbackClassifier;
pub use keyword::KeywordClassifier;
pub use oracle::{OllamaOracle, OracleClassifier, OracleClient};
pub use pipeline::{
    ClassifierSetting, Detection, DetectionPipeline, StrategyKit, build_classifiers_from_settings,
    default_classifier_settings,
};
pub use similarity::SimilarityClassifier;

pub const EXACT_TYPE: &str = "exact-type";
pub const KEYWORD: &str = "keyword";
pub const SIMILARITY: &str = "similarity";
pub const ORACLE: &str = "oracle";
pub const FALLBACK: &str = "html-fallback";

/// A classifier's answer for one field. "No opinion" is `None`, never a
/// low-confidence result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierResult {
    pub field_type: FieldType,
    pub confidence: f32,
    pub method: DetectionMethod,
}

impl ClassifierResult {
    pub fn new(field_type: FieldType, confidence: f32, method: DetectionMethod) -> Self {
        ClassifierResult {
            field_type,
            confidence,
            method,
        }
    }
}

/// One pluggable detection strategy.
///
/// `detect` is pure and must not panic; internal failures degrade to `None`.
/// Strategies that need I/O override `detect_async` and abstain in `detect`.
#[async_trait]
pub trait FieldClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, field: &CandidateField) -> Option<ClassifierResult>;

    async fn detect_async(&self, field: &CandidateField) -> Option<ClassifierResult> {
        self.detect(field)
    }
}
