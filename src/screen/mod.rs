pub mod collector;
pub mod detector;
pub mod reconcile;

pub use collector::{
    collect_native_fields, detect_native_fields, detect_native_fields_async, is_fillable,
    stream_native_fields,
};
pub use detector::FieldDetector;
pub use reconcile::{reconcile, reconcile_async};
