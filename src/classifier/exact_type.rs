use crate::classifier::{ClassifierResult, EXACT_TYPE, FieldClassifier};
use crate::field::{CandidateField, DetectionMethod, FieldType};

/// Maps the native `type` attribute (or the tag) straight to a semantic type.
pub struct ExactTypeClassifier;

impl ExactTypeClassifier {
    /// `None` means the element carries no useful native hint.
    pub fn native_type(tag: &str, input_type: Option<&str>) -> Option<FieldType> {
        match tag {
            "select" => return Some(FieldType::Select),
            "input" => {}
            _ => return None,
        }

        match input_type? {
            "email" => Some(FieldType::Email),
            "password" => Some(FieldType::Password),
            "tel" => Some(FieldType::Phone),
            "url" => Some(FieldType::Website),
            "date" | "datetime-local" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "number" => Some(FieldType::Number),
            "checkbox" => Some(FieldType::Checkbox),
            "radio" => Some(FieldType::Radio),
            // Known widgets without a domain meaning
            "range" | "color" | "month" | "week" => Some(FieldType::Unknown),
            _ => None,
        }
    }
}

impl FieldClassifier for ExactTypeClassifier {
    fn name(&self) -> &'static str {
        EXACT_TYPE
    }

    fn detect(&self, field: &CandidateField) -> Option<ClassifierResult> {
        let field_type = Self::native_type(&field.tag, field.input_type.as_deref())?;
        Some(ClassifierResult::new(field_type, 1.0, DetectionMethod::ExactType))
    }
}
