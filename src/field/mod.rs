pub mod field_model;
pub mod signals;

pub use field_model::{CandidateField, DetectionMethod, FieldCategory, FieldOption, FieldType};
pub use signals::build_signals;
