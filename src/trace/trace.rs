use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::field::CandidateField;

/// One JSONL line per classified field.
#[derive(Debug, Serialize)]
pub struct DetectionTrace {
    pub timestamp_ms: u128,
    pub url: String,

    pub selector: String,
    pub adapter: Option<String>,
    pub signals: String,

    pub field_type: String,
    pub method: Option<String>,
    pub confidence: f32,
    pub duration_ms: f64,

    pub mode: &'static str,
}

impl DetectionTrace {
    pub fn from_field(url: &str, field: &CandidateField, mode: &'static str) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            url: url.to_string(),
            selector: field.selector.clone(),
            adapter: field.adapter_name.clone(),
            signals: field.signals.clone(),
            field_type: field.field_type.to_string(),
            method: field.detection_method.map(|m| m.to_string()),
            confidence: field.detection_confidence,
            duration_ms: field.detection_duration_ms,
            mode,
        }
    }
}
