use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::dom::node::{DomNode, DomTree, NodeId, NodeSnapshot};
use crate::dom::selector::{Selector, quote_value};
use crate::error::FormError;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        name: String,
    },
    CharacterData,
}

/// One structural change to the page, delivered to mutation subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    Focus,
    Blur,
    Input,
    Change,
    MouseDown,
    MouseUp,
    Click,
    KeyDown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageEvent {
    pub target: NodeId,
    pub event: DomEvent,
}

/// A live, queryable page.
///
/// All state sits behind one mutex that is only held for the duration of a
/// single call, so a `Page` can be shared as `Arc<Page>` between the
/// detector, adapters awaiting an overlay, and the mutation watcher.
pub struct Page {
    url: String,
    tree: Mutex<DomTree>,
    mutations: broadcast::Sender<MutationRecord>,
    events: broadcast::Sender<PageEvent>,
}

impl Page {
    /// Empty document with a single `<body>`.
    pub fn new(url: &str) -> Self {
        Self::from_snapshot(url, &NodeSnapshot::new("body"))
    }

    pub fn from_snapshot(url: &str, root: &NodeSnapshot) -> Self {
        let (mutations, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Page {
            url: url.to_string(),
            tree: Mutex::new(DomTree::from_snapshot(root)),
            mutations,
            events,
        }
    }

    /// Parse a `{ "url": ..., "root": {...} }` document or a bare root node.
    pub fn from_json(json: &str) -> Result<Self, FormError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| FormError::json("page snapshot", e))?;

        let url = value["url"].as_str().unwrap_or("about:blank").to_string();
        let root_value = if value.get("root").is_some() {
            value["root"].clone()
        } else {
            value
        };
        let root: NodeSnapshot = serde_json::from_value(root_value)
            .map_err(|e| FormError::json("page snapshot root", e))?;

        Ok(Self::from_snapshot(&url, &root))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn lock(&self) -> MutexGuard<'_, DomTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> NodeId {
        self.lock().root()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        let tree = self.lock();
        tree.to_snapshot(tree.root())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<DomNode> {
        self.lock().get(id).cloned()
    }

    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.lock().get(id).map(|n| n.tag.clone())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.lock()
            .get(id)
            .and_then(|n| n.attr(name).map(str::to_string))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.lock().get(id).is_some_and(|n| n.has_class(class))
    }

    pub fn value(&self, id: NodeId) -> Option<String> {
        self.lock().get(id).and_then(|n| n.value.clone())
    }

    pub fn is_checked(&self, id: NodeId) -> bool {
        self.lock().get(id).is_some_and(|n| n.checked)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.lock().text_content(id)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.lock().is_attached(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.lock().parent(id)
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.lock().ancestors(id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.lock()
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let tree = self.lock();
        let parent = tree.get(tree.parent(id)?)?;
        let pos = parent.children.iter().position(|c| *c == id)?;
        pos.checked_sub(1).map(|p| parent.children[p])
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.lock().focused
    }

    /// Inclusive: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.lock().contains(ancestor, node)
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        let tree = self.lock();
        tree.is_attached(id) && selector.matches_node(&tree, id)
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let tree = self.lock();
        if !tree.is_attached(id) {
            return None;
        }
        std::iter::once(id)
            .chain(tree.ancestors(id))
            .find(|n| selector.matches_node(&tree, *n))
    }

    /// `id` or one of its ancestors matches. Also answers for a node that was
    /// just removed, through the parent it was removed from.
    pub fn is_within(&self, id: NodeId, selector: &Selector) -> bool {
        let tree = self.lock();
        std::iter::once(id)
            .chain(tree.ancestors(id))
            .any(|n| selector.matches_node(&tree, n))
    }

    /// Attached nodes matching `selector`, in document order.
    pub fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        let tree = self.lock();
        let root = tree.root();
        std::iter::once(root)
            .chain(tree.descendants(root))
            .filter(|n| selector.matches_node(&tree, *n))
            .collect()
    }

    pub fn query_one(&self, selector: &Selector) -> Option<NodeId> {
        self.query_all(selector).into_iter().next()
    }

    /// Descendants of `scope` matching `selector`, `scope` excluded.
    pub fn query_all_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let tree = self.lock();
        tree.descendants(scope)
            .into_iter()
            .filter(|n| selector.matches_node(&tree, *n))
            .collect()
    }

    pub fn query_one_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.query_all_within(scope, selector).into_iter().next()
    }

    pub fn document_position(&self, id: NodeId) -> Option<usize> {
        let tree = self.lock();
        let root = tree.root();
        std::iter::once(root)
            .chain(tree.descendants(root))
            .position(|n| n == id)
    }

    /// Hidden when the node or an ancestor carries `hidden`, `display:none`
    /// or `visibility:hidden`, or when the node's known rect has no area.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let tree = self.lock();
        let Some(node) = tree.get(id) else {
            return false;
        };
        if !node.attached {
            return false;
        }
        if node.rect.is_some_and(|r| r.is_empty()) {
            return false;
        }

        std::iter::once(id).chain(tree.ancestors(id)).all(|n| {
            tree.get(n).is_some_and(|node| {
                let style = node
                    .attr("style")
                    .unwrap_or("")
                    .to_lowercase()
                    .replace(' ', "");
                node.attr("hidden").is_none()
                    && !style.contains("display:none")
                    && !style.contains("visibility:hidden")
            })
        })
    }

    /// A locator that re-resolves to `id` through `query_one`: a unique id,
    /// else a unique `tag[name=...]`, else an `nth-of-type` chain anchored at
    /// the nearest uniquely identified ancestor or the root.
    pub fn css_path(&self, id: NodeId) -> String {
        let tree = self.lock();
        let Some(node) = tree.get(id) else {
            return String::new();
        };

        if let Some(sel) = node.attr("id").and_then(|v| unique_id_selector(&tree, v)) {
            return sel;
        }
        if let Some(name) = node.attr("name").filter(|n| !n.is_empty()) {
            let sel = format!("{}[name={}]", node.tag, quote_value(name));
            if is_unique(&tree, &sel) {
                return sel;
            }
        }

        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(n) = tree.get(cur) else { break };
            if cur != id {
                if let Some(sel) = n.attr("id").and_then(|v| unique_id_selector(&tree, v)) {
                    segments.push(sel);
                    break;
                }
            }
            match n.parent.and_then(|p| tree.get(p).map(|pn| (p, pn))) {
                None => {
                    segments.push(n.tag.clone());
                    break;
                }
                Some((p, parent)) => {
                    let index = parent
                        .children
                        .iter()
                        .filter(|c| tree.get(**c).is_some_and(|s| s.tag == n.tag))
                        .position(|c| *c == cur)
                        .unwrap_or(0);
                    segments.push(format!("{}:nth-of-type({})", n.tag, index + 1));
                    current = Some(p);
                }
            }
        }

        segments.reverse();
        segments.join(" > ")
    }

    // ------------------------------------------------------------------
    // Structural mutations (emit MutationRecords)
    // ------------------------------------------------------------------

    pub fn subscribe_mutations(&self) -> broadcast::Receiver<MutationRecord> {
        self.mutations.subscribe()
    }

    fn emit(&self, record: MutationRecord) {
        // No subscribers is fine.
        let _ = self.mutations.send(record);
    }

    pub fn append_child(&self, parent: NodeId, child: NodeSnapshot) -> Option<NodeId> {
        let id = {
            let mut tree = self.lock();
            if !tree.is_attached(parent) {
                return None;
            }
            tree.insert(Some(parent), &child)
        };
        self.emit(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![id],
                removed: vec![],
            },
        });
        Some(id)
    }

    pub fn remove(&self, id: NodeId) -> bool {
        let parent = {
            let mut tree = self.lock();
            if !tree.is_attached(id) {
                return false;
            }
            tree.detach(id)
        };
        match parent {
            Some(parent) => {
                self.emit(MutationRecord {
                    target: parent,
                    kind: MutationKind::ChildList {
                        added: vec![],
                        removed: vec![id],
                    },
                });
                true
            }
            None => false,
        }
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) -> bool {
        {
            let mut tree = self.lock();
            match tree.get_mut(id) {
                Some(node) if node.attached => {
                    node.attrs.insert(name.to_string(), value.to_string());
                }
                _ => return false,
            }
        }
        self.emit(MutationRecord {
            target: id,
            kind: MutationKind::Attributes {
                name: name.to_string(),
            },
        });
        true
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) -> bool {
        let removed = {
            let mut tree = self.lock();
            match tree.get_mut(id) {
                Some(node) if node.attached => node.attrs.remove(name).is_some(),
                _ => false,
            }
        };
        if removed {
            self.emit(MutationRecord {
                target: id,
                kind: MutationKind::Attributes {
                    name: name.to_string(),
                },
            });
        }
        removed
    }

    pub fn set_text(&self, id: NodeId, text: &str) -> bool {
        {
            let mut tree = self.lock();
            match tree.get_mut(id) {
                Some(node) if node.attached => node.text = Some(text.to_string()),
                _ => return false,
            }
        }
        self.emit(MutationRecord {
            target: id,
            kind: MutationKind::CharacterData,
        });
        true
    }

    // ------------------------------------------------------------------
    // Interaction (property writes and events, no MutationRecords)
    // ------------------------------------------------------------------

    pub fn subscribe_events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    pub fn dispatch(&self, target: NodeId, event: DomEvent) {
        if !self.is_attached(target) {
            return;
        }
        let _ = self.events.send(PageEvent { target, event });
    }

    pub fn focus(&self, id: NodeId) {
        {
            let mut tree = self.lock();
            if !tree.is_attached(id) {
                return;
            }
            tree.focused = Some(id);
        }
        self.dispatch(id, DomEvent::Focus);
    }

    /// The native `value` property setter: bypasses any framework wrapper and
    /// does not notify anyone until an event is dispatched.
    pub fn set_value(&self, id: NodeId, value: &str) -> bool {
        let mut tree = self.lock();
        match tree.get_mut(id) {
            Some(node) if node.attached => {
                node.value = Some(value.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn set_checked(&self, id: NodeId, checked: bool) -> bool {
        let mut tree = self.lock();
        match tree.get_mut(id) {
            Some(node) if node.attached => {
                node.checked = checked;
                true
            }
            _ => false,
        }
    }
}

fn is_unique(tree: &DomTree, selector: &str) -> bool {
    let Ok(sel) = Selector::parse(selector) else {
        return false;
    };
    let root = tree.root();
    std::iter::once(root)
        .chain(tree.descendants(root))
        .filter(|n| sel.matches_node(tree, *n))
        .count()
        == 1
}

fn unique_id_selector(tree: &DomTree, id_value: &str) -> Option<String> {
    if id_value.is_empty() {
        return None;
    }
    let simple = id_value
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && id_value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');

    let sel = if simple {
        format!("#{}", id_value)
    } else {
        format!("[id={}]", quote_value(id_value))
    };
    is_unique(tree, &sel).then_some(sel)
}
