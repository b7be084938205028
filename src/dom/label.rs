use once_cell::sync::Lazy;

use crate::dom::node::NodeId;
use crate::dom::page::Page;
use crate::dom::selector::{Selector, quote_value};

static LABEL: Lazy<Selector> = Lazy::new(|| Selector::parse("label").expect("static selector"));

const MAX_SIBLING_LABEL_LEN: usize = 60;

/// Find the human-readable label of a control.
///
/// Tried in order: `label[for=id]`, a wrapping `<label>`, `aria-labelledby`,
/// `aria-label`, `title`, then a short text in the preceding sibling.
pub fn find_label(page: &Page, id: NodeId) -> Option<String> {
    label_for_attr(page, id)
        .or_else(|| wrapping_label(page, id))
        .or_else(|| labelled_by(page, id))
        .or_else(|| page.attr(id, "aria-label").and_then(|l| clean_label(&l)))
        .or_else(|| page.attr(id, "title").and_then(|l| clean_label(&l)))
        .or_else(|| preceding_text(page, id))
}

/// Collapse whitespace and strip trailing `:` / `*` decorations.
pub fn clean_label(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn label_for_attr(page: &Page, id: NodeId) -> Option<String> {
    let element_id = page.attr(id, "id").filter(|v| !v.is_empty())?;
    let selector = Selector::parse(&format!("label[for={}]", quote_value(&element_id))).ok()?;
    let label = page.query_one(&selector)?;
    clean_label(&page.text_content(label))
}

fn wrapping_label(page: &Page, id: NodeId) -> Option<String> {
    let parent = page.parent(id)?;
    let label = page.closest(parent, &LABEL)?;
    clean_label(&page.text_content(label))
}

fn labelled_by(page: &Page, id: NodeId) -> Option<String> {
    let ids = page.attr(id, "aria-labelledby")?;
    let texts: Vec<String> = ids
        .split_whitespace()
        .filter_map(|ref_id| Selector::parse(&format!("[id={}]", quote_value(ref_id))).ok())
        .filter_map(|sel| page.query_one(&sel))
        .map(|node| page.text_content(node))
        .filter(|t| !t.trim().is_empty())
        .collect();

    clean_label(&texts.join(" "))
}

fn preceding_text(page: &Page, id: NodeId) -> Option<String> {
    let mut current = page.previous_sibling(id);
    while let Some(sibling) = current {
        let tag = page.tag(sibling).unwrap_or_default();
        if matches!(tag.as_str(), "input" | "select" | "textarea" | "button") {
            return None;
        }
        let text = page.text_content(sibling);
        if !text.trim().is_empty() {
            if text.len() > MAX_SIBLING_LABEL_LEN {
                return None;
            }
            return clean_label(&text);
        }
        current = page.previous_sibling(sibling);
    }
    None
}
