//! Arena-backed element tree
//!
//! The tree is built incrementally by the producer and read by consumers
//! while it grows. Elements are stored in a slot arena addressed by
//! generational [`NodeId`]s; removing a subtree frees its slots for reuse.

use super::node::{AttributeChange, AttributeChangeKind, Element, NodeId, Overlay, TextChange, TextChangeKind};
use crate::error::{Error, Result};

struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// Element arena plus the ordered list of root elements
#[derive(Default)]
pub struct ElementTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    /// Spans of deleted root elements, used when writing the whole document
    root_overlay: Overlay,
    len: usize,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.element.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.element.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    fn allocate(&mut self, element: Element) -> NodeId {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.element = Some(element);
                NodeId { index, generation: slot.generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, element: Some(element) });
                NodeId { index, generation: 0 }
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Element> {
        let slot = self.slots.get_mut(id.index as usize).filter(|slot| slot.generation == id.generation)?;
        let element = slot.element.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(element)
    }

    /// Append a root element
    pub fn add_root(&mut self, element: Element) -> NodeId {
        let id = self.allocate(element);
        if let Some(&last) = self.roots.last() {
            if let Some(prev) = self.get_mut(last) {
                prev.next_sibling = Some(id);
            }
        }
        self.roots.push(id);
        id
    }

    /// Append `element` as the last child of `parent`, linking the previous
    /// last child's `next_sibling`. Returns `None` if `parent` is stale.
    pub fn add_child(&mut self, parent: NodeId, mut element: Element) -> Option<NodeId> {
        let previous = self.get(parent)?.children.last().copied();
        element.parent = Some(parent);
        let id = self.allocate(element);
        if let Some(prev) = previous.and_then(|p| self.get_mut(p)) {
            prev.next_sibling = Some(id);
        }
        self.get_mut(parent)?.children.push(id);
        Some(id)
    }

    /// Detach `child` from `parent` and free its subtree.
    ///
    /// Nothing is recorded in the overlay, so a written parent still
    /// reproduces the child's bytes from the source.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(position) = self.get(parent).and_then(|p| p.children.iter().position(|&c| c == child)) else {
            return false;
        };
        let next = self.get(child).and_then(|c| c.next_sibling);
        let Some(parent_element) = self.get_mut(parent) else {
            return false;
        };
        parent_element.children.remove(position);
        if position > 0 {
            let previous = parent_element.children[position - 1];
            if let Some(prev) = self.get_mut(previous) {
                prev.next_sibling = next;
            }
        }
        self.free_subtree(child);
        true
    }

    fn detach_root(&mut self, id: NodeId) -> bool {
        let Some(position) = self.roots.iter().position(|&r| r == id) else {
            return false;
        };
        let next = self.get(id).and_then(|e| e.next_sibling);
        self.roots.remove(position);
        if position > 0 {
            let previous = self.roots[position - 1];
            if let Some(prev) = self.get_mut(previous) {
                prev.next_sibling = next;
            }
        }
        self.free_subtree(id);
        true
    }

    fn free_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            if let Some(element) = self.release(current) {
                stack.extend(element.children);
                freed += 1;
            }
        }
        freed
    }

    /// Delete an element so that writing its parent omits it.
    ///
    /// The element must be fully parsed, since its source span is recorded.
    pub fn delete(&mut self, id: NodeId) -> Result<bool> {
        let Some(element) = self.get(id) else {
            return Ok(false);
        };
        let start = element.start_offset;
        let end = element.end_offset.ok_or(Error::UnfinishedElement { start })?;

        match element.parent {
            Some(parent) => {
                if let Some(parent_element) = self.get_mut(parent) {
                    parent_element.overlay.deleted_spans.push((start, end));
                }
                Ok(self.remove_child(parent, id))
            }
            None => {
                self.root_overlay.deleted_spans.push((start, end));
                Ok(self.detach_root(id))
            }
        }
    }

    /// Snapshot of the root list
    pub fn roots(&self) -> Vec<NodeId> {
        self.roots.clone()
    }

    pub fn first_root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    pub(crate) fn root_overlay(&self) -> &Overlay {
        &self.root_overlay
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.children.first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Record the closing offset of an element
    pub fn set_end(&mut self, id: NodeId, end_offset: u64) {
        if let Some(element) = self.get_mut(id) {
            element.end_offset = Some(end_offset);
        }
    }

    /// Add a parsed text run
    pub fn push_text_fragment(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(element) = self.get_mut(id) {
            element.text_fragments.push(text.into());
        }
    }

    /// True if more elements may still appear after `id` in its scope:
    /// the element itself or its parent is open
    pub fn scope_is_open(&self, id: NodeId) -> bool {
        let Some(element) = self.get(id) else {
            return false;
        };
        element.is_open() || element.parent.and_then(|p| self.get(p)).is_some_and(Element::is_open)
    }

    // Overlay edits. Each returns false if the id is stale.

    /// Set an attribute, recording `Modify` if it exists and `Add` otherwise
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: &str) -> bool {
        let Some(element) = self.get_mut(id) else {
            return false;
        };
        let kind = if element.attributes.contains_key(key) {
            AttributeChangeKind::Modify
        } else {
            AttributeChangeKind::Add
        };
        element.attributes.insert(key.to_string(), value.to_string());
        element.overlay.attr_changes.push(AttributeChange { kind, key: key.to_string(), value: value.to_string() });
        true
    }

    /// Modify an attribute only if it already exists
    pub fn update_attribute(&mut self, id: NodeId, key: &str, value: &str) -> bool {
        match self.get(id) {
            Some(element) if element.attributes.contains_key(key) => self.set_attribute(id, key, value),
            _ => false,
        }
    }

    /// Remove an attribute; records nothing if it is absent
    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> bool {
        let Some(element) = self.get_mut(id) else {
            return false;
        };
        if element.attributes.remove(key).is_none() {
            return false;
        }
        element.overlay.attr_changes.push(AttributeChange {
            kind: AttributeChangeKind::Remove,
            key: key.to_string(),
            value: String::new(),
        });
        true
    }

    pub fn append_text(&mut self, id: NodeId, text: &str) -> bool {
        let Some(element) = self.get_mut(id) else {
            return false;
        };
        element.text_fragments.push(text.to_string());
        element.overlay.text_changes.push(TextChange { kind: TextChangeKind::Append, value: text.to_string() });
        true
    }

    /// Replace the element's text with `text`
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        let Some(element) = self.get_mut(id) else {
            return false;
        };
        element.text_fragments = vec![text.to_string()];
        element.overlay.text_changes.push(TextChange { kind: TextChangeKind::Modify, value: text.to_string() });
        true
    }

    pub fn remove_text(&mut self, id: NodeId) -> bool {
        let Some(element) = self.get_mut(id) else {
            return false;
        };
        element.text_fragments.clear();
        element.overlay.text_changes.push(TextChange { kind: TextChangeKind::Remove, value: String::new() });
        true
    }

    /// Depth-first search for `tag` below `start`, then through `start`'s
    /// following siblings and their subtrees. Never ascends to the parent
    /// and never returns `start` itself.
    pub fn find_forward(&self, start: NodeId, tag: &str) -> Option<NodeId> {
        if let Some(found) = self.find_in_children(start, tag) {
            return Some(found);
        }
        let mut sibling = self.next_sibling(start);
        while let Some(current) = sibling {
            if self.get(current).is_some_and(|e| e.tag_name == tag) {
                return Some(current);
            }
            if let Some(found) = self.find_in_children(current, tag) {
                return Some(found);
            }
            sibling = self.next_sibling(current);
        }
        None
    }

    fn find_in_children(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        // Explicit stack in document order to avoid recursion on deep trees
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(element) = self.get(current) else {
                continue;
            };
            if element.tag_name == tag {
                return Some(current);
            }
            stack.extend(element.children.iter().rev().copied());
        }
        None
    }
}
