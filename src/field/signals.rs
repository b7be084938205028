use crate::field::field_model::CandidateField;

/// Lower-case, space-joined `label name id placeholder autocomplete`,
/// skipping the hints that are absent or blank.
pub fn build_signals(field: &CandidateField) -> String {
    [
        field.label.as_deref(),
        field.name.as_deref(),
        field.id.as_deref(),
        field.placeholder.as_deref(),
        field.autocomplete.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}
