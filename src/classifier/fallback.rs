use crate::classifier::{ClassifierResult, FALLBACK, FieldClassifier};
use crate::field::{CandidateField, DetectionMethod, FieldType};

const MAPPED_CONFIDENCE: f32 = 0.3;
const UNKNOWN_CONFIDENCE: f32 = 0.1;

/// Last resort: never abstains, so the pipeline always terminates.
pub struct FallbackClassifier;

impl FieldClassifier for FallbackClassifier {
    fn name(&self) -> &'static str {
        FALLBACK
    }

    fn detect(&self, field: &CandidateField) -> Option<ClassifierResult> {
        let mapped = match (field.tag.as_str(), field.input_type.as_deref()) {
            ("select", _) => Some(FieldType::Select),
            ("textarea", _) => Some(FieldType::Text),
            ("input", Some("checkbox")) => Some(FieldType::Checkbox),
            ("input", Some("radio")) => Some(FieldType::Radio),
            _ => None,
        };

        Some(match mapped {
            Some(t) => ClassifierResult::new(t, MAPPED_CONFIDENCE, DetectionMethod::HtmlFallback),
            None => ClassifierResult::new(
                FieldType::Unknown,
                UNKNOWN_CONFIDENCE,
                DetectionMethod::HtmlFallback,
            ),
        })
    }
}
