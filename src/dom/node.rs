//! Element node representation
//!
//! Nodes live in the [`ElementTree`](super::ElementTree) arena and refer to
//! each other by [`NodeId`]. Parent and sibling links are lookups only; the
//! parent's `children` list owns its nodes.

use std::collections::HashMap;

/// Generational index into the element arena.
///
/// A slot freed by reclamation or deletion bumps its generation, so an id
/// kept across a removal resolves to `None` instead of a different element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Slot index, stable for the lifetime of the node
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Kind of a recorded attribute change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeChangeKind {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub kind: AttributeChangeKind,
    pub key: String,
    /// Unescaped value; empty for `Remove`
    pub value: String,
}

/// Kind of a recorded text change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextChangeKind {
    Append,
    Modify,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub kind: TextChangeKind,
    pub value: String,
}

/// Append-only log of edits, applied only when the element is written
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pub attr_changes: Vec<AttributeChange>,
    pub text_changes: Vec<TextChange>,
    /// Inclusive source spans of explicitly deleted children
    pub deleted_spans: Vec<(u64, u64)>,
}

impl Overlay {
    /// True if writing the element requires patching its own bytes
    pub fn patches_element(&self) -> bool {
        !self.attr_changes.is_empty() || !self.text_changes.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.patches_element() && self.deleted_spans.is_empty()
    }

    /// True if `offset` lies inside a deleted child's span
    pub fn is_deleted(&self, offset: u64) -> bool {
        self.deleted_spans.iter().any(|&(start, end)| start <= offset && offset <= end)
    }
}

/// An element in the arena
#[derive(Debug, Clone)]
pub struct Element {
    /// Local name
    pub tag_name: String,
    /// Offset of the start tag's `<`
    pub start_offset: u64,
    /// Offset of the end tag's final `>`; `None` while the element is open
    pub end_offset: Option<u64>,
    /// Attributes keyed by local name
    pub attributes: HashMap<String, String>,
    /// Non-whitespace text runs in document order
    pub text_fragments: Vec<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub overlay: Overlay,
}

impl Element {
    pub fn new(tag_name: impl Into<String>, start_offset: u64) -> Self {
        Element {
            tag_name: tag_name.into(),
            start_offset,
            end_offset: None,
            attributes: HashMap::new(),
            text_fragments: Vec::new(),
            children: Vec::new(),
            parent: None,
            next_sibling: None,
            overlay: Overlay::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = (String, String)>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// An element is open until its closing tag has been consumed
    #[inline]
    pub fn is_open(&self) -> bool {
        self.end_offset.is_none()
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Text fragments joined without separators
    pub fn text(&self) -> String {
        self.text_fragments.concat()
    }
}
