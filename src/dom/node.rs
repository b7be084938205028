use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity handle of a node inside one `Page`. Never reused; a removed node
/// keeps its id and reports itself as detached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn sized(width: f64, height: f64) -> Self {
        Rect {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Serializable tree form of a page, as produced by a browser-side extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn new(tag: &str) -> Self {
        NodeSnapshot {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn rect(mut self, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::sized(width, height));
        self
    }

    pub fn child(mut self, child: NodeSnapshot) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Read-only copy of one node's state.
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub value: Option<String>,
    pub checked: bool,
    pub rect: Option<Rect>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub attached: bool,
}

impl DomNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|part| part == class))
    }
}

/// Arena holding every node ever inserted into a page.
#[derive(Debug)]
pub(crate) struct DomTree {
    nodes: Vec<DomNode>,
    root: NodeId,
    pub(crate) focused: Option<NodeId>,
}

impl DomTree {
    pub(crate) fn from_snapshot(snapshot: &NodeSnapshot) -> Self {
        let mut tree = DomTree {
            nodes: Vec::new(),
            root: NodeId(0),
            focused: None,
        };
        tree.root = tree.insert(None, snapshot);
        tree
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn insert(&mut self, parent: Option<NodeId>, snapshot: &NodeSnapshot) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DomNode {
            tag: snapshot.tag.to_lowercase(),
            attrs: snapshot.attrs.clone(),
            text: snapshot.text.clone(),
            value: snapshot.value.clone(),
            checked: snapshot.checked,
            rect: snapshot.rect,
            parent,
            children: Vec::new(),
            attached: true,
        });

        if let Some(p) = parent {
            if let Some(parent_node) = self.nodes.get_mut(p.0) {
                parent_node.children.push(id);
            }
        }

        for child in &snapshot.children {
            self.insert(Some(id), child);
        }

        id
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn is_attached(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.attached)
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub(crate) fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Attached nodes below `scope` in document (pre-)order, `scope` excluded.
    pub(crate) fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_attached(scope) {
            return out;
        }
        let mut stack: Vec<NodeId> = self
            .get(scope)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.get(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).contains(&ancestor)
    }

    pub(crate) fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        if let Some(text) = self.get(id).and_then(|n| n.text.as_deref()) {
            parts.push(text.trim().to_string());
        }
        for d in self.descendants(id) {
            if let Some(text) = self.get(d).and_then(|n| n.text.as_deref()) {
                parts.push(text.trim().to_string());
            }
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// Unlinks `id` from its parent and marks its whole subtree detached.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let subtree = self.descendants(id);
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        for d in subtree.into_iter().chain(std::iter::once(id)) {
            if let Some(node) = self.get_mut(d) {
                node.attached = false;
            }
            if self.focused == Some(d) {
                self.focused = None;
            }
        }
        Some(parent)
    }

    pub(crate) fn to_snapshot(&self, id: NodeId) -> NodeSnapshot {
        let Some(node) = self.get(id) else {
            return NodeSnapshot::default();
        };
        NodeSnapshot {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: node.text.clone(),
            value: node.value.clone(),
            checked: node.checked,
            rect: node.rect,
            children: node.children.iter().map(|c| self.to_snapshot(*c)).collect(),
        }
    }
}
