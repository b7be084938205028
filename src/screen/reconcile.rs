use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::classifier::{ClassifierResult, FieldClassifier, KeywordClassifier};
use crate::dom::Page;
use crate::field::{CandidateField, DetectionMethod};

/// Structural inference for a concrete adapter type ("select", "date", ...).
pub const CUSTOM_SELECT_CONFIDENCE: f32 = 0.7;
/// Structural inference when the adapter itself only knows "text"/"unknown".
pub const CUSTOM_GENERIC_CONFIDENCE: f32 = 0.4;

/// Merge native and adapter fields.
///
/// Native controls under a claimed wrapper are dropped. Adapter fields are
/// re-classified by keyword only: a concrete keyword type is adopted, a
/// generic one only replaces a generic adapter type, and a field nobody
/// classified gets the `custom-select` stamp. Output is in document order.
pub fn reconcile(
    page: &Page,
    native: Vec<CandidateField>,
    custom: Vec<CandidateField>,
    keyword: &KeywordClassifier,
) -> Vec<CandidateField> {
    let mut custom = custom;
    for field in &mut custom {
        let started = Instant::now();
        let result = keyword.detect(field);
        adopt(field, result);
        finish(field, started);
    }
    merge(page, native, custom)
}

/// Like [`reconcile`], but adapter fields go through `chain` (keyword,
/// similarity, oracle). Generic intermediate answers do not stop the chain.
pub async fn reconcile_async(
    page: &Page,
    native: Vec<CandidateField>,
    custom: Vec<CandidateField>,
    chain: &[Arc<dyn FieldClassifier>],
) -> Vec<CandidateField> {
    let mut custom = custom;
    for field in &mut custom {
        let started = Instant::now();
        let mut generic: Option<ClassifierResult> = None;
        let mut concrete: Option<ClassifierResult> = None;

        for classifier in chain {
            match classifier.detect_async(field).await {
                Some(result) if !result.field_type.is_generic() => {
                    concrete = Some(result);
                    break;
                }
                Some(result) => {
                    generic.get_or_insert(result);
                }
                None => {}
            }
        }

        adopt(field, concrete.or(generic));
        finish(field, started);
    }
    merge(page, native, custom)
}

fn adopt(field: &mut CandidateField, result: Option<ClassifierResult>) {
    if let Some(result) = result {
        if !result.field_type.is_generic() || field.field_type.is_generic() {
            field.apply_detection(result.field_type, result.method, result.confidence);
        }
    }

    if field.detection_method.is_none() {
        let confidence = if field.field_type.is_generic() {
            CUSTOM_GENERIC_CONFIDENCE
        } else {
            CUSTOM_SELECT_CONFIDENCE
        };
        field.apply_detection(field.field_type, DetectionMethod::CustomSelect, confidence);
    }
}

fn finish(field: &mut CandidateField, started: Instant) {
    field.detection_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!(
        selector = %field.selector,
        adapter = field.adapter_name.as_deref().unwrap_or(""),
        field_type = %field.field_type,
        method = ?field.detection_method,
        "custom field reconciled"
    );
}

fn merge(
    page: &Page,
    native: Vec<CandidateField>,
    custom: Vec<CandidateField>,
) -> Vec<CandidateField> {
    let wrappers: Vec<_> = custom.iter().map(|f| f.element).collect();
    let before = native.len();

    let mut merged: Vec<CandidateField> = native
        .into_iter()
        .filter(|f| !wrappers.iter().any(|w| page.contains(*w, f.element)))
        .collect();

    if merged.len() != before {
        debug!(dropped = before - merged.len(), "native fields under custom widgets dropped");
    }

    merged.extend(custom);
    merged.sort_by_key(|f| page.document_position(f.element).unwrap_or(usize::MAX));
    merged
}
