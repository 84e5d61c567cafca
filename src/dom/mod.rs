//! DOM Module - Arena-based element tree
//!
//! - Arena allocation for elements, addressed by generational [`NodeId`]s
//! - Parent and sibling links as lookups, children lists as ownership
//! - Mutation overlay recorded per element and applied only on write
//! - Byte-exact writer that copies untouched regions from the source

pub mod node;
pub mod patch;
pub mod tree;
pub mod writer;

pub use node::{AttributeChange, AttributeChangeKind, Element, NodeId, Overlay, TextChange, TextChangeKind};
pub use tree::ElementTree;
pub use writer::MutationWriter;
