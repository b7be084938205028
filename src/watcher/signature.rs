use std::collections::BTreeSet;

use sha1::{Digest, Sha1};

use crate::field::{CandidateField, FieldType};

/// Order-independent summary of the detected `(selector, type)` pairs.
/// Only used to notice that the page's fields changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSignature {
    entries: BTreeSet<(String, FieldType)>,
    fingerprint: String,
}

impl FieldSignature {
    pub fn from_fields(fields: &[CandidateField]) -> Self {
        let entries: BTreeSet<(String, FieldType)> = fields
            .iter()
            .map(|f| (f.selector.clone(), f.field_type))
            .collect();

        let joined = entries
            .iter()
            .map(|(selector, field_type)| format!("{}|{}", selector, field_type))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            fingerprint: fingerprint(&joined),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn contains(&self, selector: &str, field_type: FieldType) -> bool {
        self.entries.contains(&(selector.to_string(), field_type))
    }

    /// Entry-count change from `previous` to `self`.
    pub fn delta(&self, previous: &FieldSignature) -> i64 {
        self.len() as i64 - previous.len() as i64
    }
}

fn fingerprint(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
