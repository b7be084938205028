pub mod label;
pub mod node;
pub mod page;
pub mod selector;

pub use node::{DomNode, NodeId, NodeSnapshot, Rect};
pub use page::{DomEvent, MutationKind, MutationRecord, Page, PageEvent};
pub use selector::Selector;
