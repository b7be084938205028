//! Form field detection and filling over an in-memory page model.
//!
//! Native controls go through a pluggable classifier chain, widget
//! library controls through adapters, and a mutation watcher keeps the
//! result current while the page changes.

pub mod adapters;
pub mod classifier;
pub mod cli;
pub mod dom;
pub mod error;
pub mod field;
pub mod fill;
pub mod logging;
pub mod screen;
pub mod trace;
pub mod watcher;

pub use adapters::{AdapterRegistry, AdapterTimings, CustomAdapter};
pub use classifier::{ClassifierResult, DetectionPipeline, FieldClassifier, StrategyKit};
pub use dom::{NodeSnapshot, Page, Selector};
pub use error::FormError;
pub use field::{CandidateField, DetectionMethod, FieldType};
pub use fill::{FillReport, FormFiller};
pub use screen::FieldDetector;
pub use watcher::{MutationWatcher, WatcherConfig, WatcherNotice};
