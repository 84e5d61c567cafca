//! Cursor navigation over a tree that is still being parsed
//!
//! A [`Navigator`] walks the element tree of a [`ParseSession`]. Moves that
//! reach the frontier of what has been parsed resume the producer and wait,
//! bounded by the session's timeouts. A timed-out wait is logged and the
//! navigator continues with whatever state exists; callers that need a
//! complete element must check [`Navigator::end_offset`].

use crate::dom::{ElementTree, NodeId};
use crate::error::Result;
use crate::strategy::ParseSession;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Direction of a single-step move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Parent,
    FirstChild,
    NextSibling,
}

/// Cursor with a stack of saved positions
pub struct Navigator<'s> {
    session: &'s ParseSession,
    current: Option<NodeId>,
    positions: Vec<NodeId>,
}

impl<'s> Navigator<'s> {
    /// Place a cursor on the first root element, waiting up to the
    /// session's `resume_timeout` for it to appear
    pub fn new(session: &'s ParseSession) -> Self {
        let timeout = session.config().resume_timeout;
        let deadline = Instant::now() + timeout;
        let current = loop {
            if let Some(root) = session.with_tree(ElementTree::first_root) {
                break Some(root);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !session.is_alive() || remaining.is_zero() {
                break None;
            }
            if session.is_paused() {
                if let Err(err) = session.resume_and_wait(remaining) {
                    log::warn!("{}", err);
                }
            } else {
                session.wait_quiescent(remaining);
            }
        };
        if current.is_none() {
            log::warn!("no root element available after {:?}", timeout);
        }
        Navigator { session, current, positions: Vec::new() }
    }

    pub fn session(&self) -> &'s ParseSession {
        self.session
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn set_current(&mut self, id: NodeId) {
        self.current = Some(id);
    }

    /// Save the current position
    pub fn push(&mut self) {
        if let Some(id) = self.current {
            self.positions.push(id);
        }
    }

    /// Restore the last saved position
    pub fn pop(&mut self) {
        match self.positions.pop() {
            Some(id) => self.current = Some(id),
            None => log::warn!("position stack is empty, cannot pop"),
        }
    }

    /// Move one step; returns whether the cursor moved
    pub fn to(&mut self, direction: Direction) -> bool {
        self.step(direction, true)
    }

    /// Move to the next sibling
    pub fn next(&mut self) -> bool {
        self.to(Direction::NextSibling)
    }

    fn step(&mut self, direction: Direction, may_load: bool) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let (target, at_frontier) = self.session.with_tree(|tree| match direction {
            Direction::Parent => (tree.parent(current), false),
            Direction::FirstChild => (tree.first_child(current), false),
            Direction::NextSibling => match tree.next_sibling(current) {
                Some(sibling) => (Some(sibling), false),
                None => (None, may_load && self.at_frontier(tree, current)),
            },
        });

        if let Some(target) = target {
            self.arrive(target);
            return true;
        }
        if !at_frontier {
            return false;
        }

        // A sibling may exist in bytes the producer has not reached yet
        let deadline = Instant::now() + self.session.config().move_wait_timeout;
        loop {
            self.resume(deadline);
            let (sibling, still_at_frontier) = self
                .session
                .with_tree(|tree| (tree.next_sibling(current), self.at_frontier(tree, current)));
            if sibling.is_some() {
                return self.step(direction, false);
            }
            if !still_at_frontier || Instant::now() >= deadline {
                return false;
            }
        }
    }

    /// True if `id` has no sibling yet but the producer may still add one
    fn at_frontier(&self, tree: &ElementTree, id: NodeId) -> bool {
        if !self.session.is_alive() {
            return false;
        }
        let Some(element) = tree.get(id) else {
            return false;
        };
        if element.parent.and_then(|p| tree.get(p)).is_some_and(|p| p.is_open()) {
            return true;
        }
        match (element.end_offset, self.session.loaded_window_end()) {
            (None, _) => true,
            (Some(end), Some(window_end)) => self.session.chunk_of(end) >= window_end,
            (Some(_), None) => false,
        }
    }

    fn arrive(&mut self, target: NodeId) {
        self.current = Some(target);
        let top_level = self.session.with_tree(|tree| {
            tree.get(target).is_some_and(|e| self.session.config().is_top_level(&e.tag_name))
        });
        if !top_level {
            self.wait_fully_parsed(target);
        }
    }

    /// Resume the producer once, bounded by `deadline` and the resume timeout
    fn resume(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let timeout = self.session.config().resume_timeout.min(remaining).max(Duration::from_millis(1));
        if let Err(err) = self.session.resume_and_wait(timeout) {
            log::warn!("{}", err);
        }
    }

    /// Wait until `id` has an end offset, resuming the producer as needed
    fn wait_fully_parsed(&self, id: NodeId) {
        let timeout = self.session.config().move_wait_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            let Some((open, start)) = self.session.with_tree(|tree| tree.get(id).map(|e| (e.is_open(), e.start_offset)))
            else {
                return;
            };
            if !open || !self.session.is_alive() {
                return;
            }
            if Instant::now() >= deadline {
                log::warn!("timed out after {:?} waiting for the element at byte {} to be fully parsed", timeout, start);
                return;
            }
            self.resume(deadline);
        }
    }

    /// Move to the first element named `tag` in the current subtree or in
    /// the following siblings' subtrees. Never ascends past the parent.
    pub fn find(&mut self, tag: &str) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let deadline = Instant::now() + self.session.config().move_wait_timeout;
        loop {
            let (found, scope_open) =
                self.session.with_tree(|tree| (tree.find_forward(current, tag), tree.scope_is_open(current)));
            if let Some(found) = found {
                self.current = Some(found);
                self.wait_fully_parsed(found);
                return true;
            }
            if !scope_open || !self.session.is_alive() || Instant::now() >= deadline {
                return false;
            }
            self.resume(deadline);
        }
    }

    /// Tag name of the current element
    pub fn tag_name(&self) -> Option<String> {
        let id = self.current?;
        self.session.with_tree(|tree| tree.get(id).map(|e| e.tag_name.clone()))
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.session.attribute(self.current?, key)
    }

    pub fn attributes(&self) -> HashMap<String, String> {
        let Some(id) = self.current else {
            return HashMap::new();
        };
        self.session.with_tree(|tree| tree.get(id).map(|e| e.attributes.clone()).unwrap_or_default())
    }

    /// Text fragments of the current element, joined
    pub fn text(&self) -> String {
        let Some(id) = self.current else {
            return String::new();
        };
        self.session.with_tree(|tree| tree.get(id).map(|e| e.text()).unwrap_or_default())
    }

    pub fn start_offset(&self) -> Option<u64> {
        let id = self.current?;
        self.session.with_tree(|tree| tree.get(id).map(|e| e.start_offset))
    }

    /// End offset of the current element, `None` while it is still open
    pub fn end_offset(&self) -> Option<u64> {
        let id = self.current?;
        self.session.with_tree(|tree| tree.get(id).and_then(|e| e.end_offset))
    }

    /// Serialized current element with its edits; empty without a position
    pub fn fragment(&self) -> Result<Vec<u8>> {
        match self.current {
            Some(id) => self.session.fragment(id),
            None => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for Navigator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fragment() {
            Ok(bytes) => f.write_str(&String::from_utf8_lossy(&bytes)),
            // An element still being parsed has no serializable extent yet
            Err(err) => {
                log::debug!("no fragment for display: {}", err);
                match self.tag_name() {
                    Some(tag) => write!(f, "<{}>", tag),
                    None => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;

    const DOC: &str = "<root><a id=\"1\">one<x/></a><b id=\"2\"><x id=\"bx\"/></b><c>three</c></root>";

    fn session(xml: &str) -> ParseSession {
        let session = ParseSession::from_bytes(xml.to_string(), WindowConfig::new());
        session.run().unwrap();
        session
    }

    #[test]
    fn test_directional_moves() {
        let session = session(DOC);
        let mut nav = Navigator::new(&session);
        assert_eq!(nav.tag_name().as_deref(), Some("root"));
        assert!(!nav.to(Direction::Parent));
        assert!(nav.to(Direction::FirstChild));
        assert_eq!(nav.attribute("id").as_deref(), Some("1"));
        assert_eq!(nav.text(), "one");
        assert!(nav.next());
        assert_eq!(nav.tag_name().as_deref(), Some("b"));
        assert!(nav.next());
        assert!(!nav.next());
        assert_eq!(nav.tag_name().as_deref(), Some("c"));
        assert!(nav.to(Direction::Parent));
        assert_eq!(nav.tag_name().as_deref(), Some("root"));
    }

    #[test]
    fn test_push_pop() {
        let session = session(DOC);
        let mut nav = Navigator::new(&session);
        nav.to(Direction::FirstChild);
        nav.push();
        nav.next();
        assert_eq!(nav.tag_name().as_deref(), Some("b"));
        nav.pop();
        assert_eq!(nav.tag_name().as_deref(), Some("a"));
        // Empty stack leaves the cursor alone
        nav.pop();
        assert_eq!(nav.tag_name().as_deref(), Some("a"));
    }

    #[test]
    fn test_find_scoping() {
        let session = session(DOC);
        let mut nav = Navigator::new(&session);
        nav.to(Direction::FirstChild);
        nav.next();
        // From b: its own subtree
        assert!(nav.find("x"));
        assert_eq!(nav.attribute("id").as_deref(), Some("bx"));
        // From b's x: no following siblings, no ascent to a
        assert!(!nav.find("a"));
        assert_eq!(nav.attribute("id").as_deref(), Some("bx"));
    }

    #[test]
    fn test_fragment_and_display() {
        let session = session(DOC);
        let mut nav = Navigator::new(&session);
        nav.to(Direction::FirstChild);
        let id = nav.current().unwrap();
        session.set_attribute(id, "id", "9");
        assert_eq!(nav.fragment().unwrap(), b"<a id=\"9\">one<x/></a>");
        assert_eq!(nav.to_string(), "<a id=\"9\">one<x/></a>");
        assert_eq!(nav.start_offset(), Some(6));
        assert_eq!(nav.end_offset(), Some(26));
    }

    #[test]
    fn test_display_open_element() {
        let mut xml = String::from("<r>");
        for i in 0..40 {
            xml.push_str(&format!("<item n=\"{:02}\"/>", i));
        }
        xml.push_str("</r>");
        let config = WindowConfig::new().chunk_size(16).window_chunks(2).top_level_tag("r");
        let session = ParseSession::from_bytes(xml, config);
        assert!(session.start().unwrap());
        assert!(session.is_paused());

        let nav = Navigator::new(&session);
        assert_eq!(nav.end_offset(), None);
        assert!(nav.fragment().is_err());
        assert_eq!(nav.to_string(), "<r>");
        session.stop();
    }

    #[test]
    fn test_no_root() {
        let session = ParseSession::from_bytes(String::new(), WindowConfig::new());
        session.run().unwrap();
        let mut nav = Navigator::new(&session);
        assert!(nav.current().is_none());
        assert!(!nav.next());
        assert!(!nav.find("a"));
        assert!(nav.fragment().unwrap().is_empty());
    }
}
