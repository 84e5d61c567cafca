//! Mutation writer
//!
//! Re-serializes elements by copying source bytes verbatim and patching
//! only the spans touched by recorded edits. An element with children is
//! written as its opening region, each child (recursively), the gaps between
//! children and its tail, so comments, whitespace and reclaimed siblings in
//! the gaps come through byte-exact.

use super::node::{NodeId, Overlay};
use super::patch::{apply_attribute_changes, apply_tail_text_changes, apply_text_changes};
use super::tree::ElementTree;
use crate::error::{Error, Result};
use crate::reader::window::WindowedByteSource;
use std::io::Write;

/// Which part of an element a byte region is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Whole element without children
    Leaf,
    /// From the start tag up to the first child
    Opening,
    /// Between two children
    Gap,
    /// From the last child through the end tag
    Tail,
}

impl Region {
    fn needs_patch(self, overlay: &Overlay) -> bool {
        match self {
            Region::Leaf => overlay.patches_element(),
            Region::Opening => !overlay.attr_changes.is_empty(),
            Region::Tail => !overlay.text_changes.is_empty(),
            Region::Gap => false,
        }
    }
}

/// Writes elements of a tree using the source the tree was parsed from
pub struct MutationWriter<'a> {
    tree: &'a ElementTree,
    source: &'a WindowedByteSource,
}

impl<'a> MutationWriter<'a> {
    pub fn new(tree: &'a ElementTree, source: &'a WindowedByteSource) -> Self {
        MutationWriter { tree, source }
    }

    /// Write one element and its subtree, with edits applied
    pub fn write_element<W: Write + ?Sized>(&self, id: NodeId, out: &mut W) -> Result<()> {
        let Some(element) = self.tree.get(id) else {
            log::debug!("skipping write of removed element {:?}", id);
            return Ok(());
        };
        let start = element.start_offset;
        let end = element.end_offset.ok_or(Error::UnfinishedElement { start })?;
        let overlay = &element.overlay;

        let (Some(&first), Some(&last)) = (element.children.first(), element.children.last()) else {
            return self.emit(start, end, overlay, Region::Leaf, out);
        };

        let first_start = self.child_start(first);
        self.emit(start, first_start.saturating_sub(1), overlay, Region::Opening, out)?;

        for pair in element.children.windows(2) {
            self.write_element(pair[0], out)?;
            let gap_start = self.child_end(pair[0])? + 1;
            let next_start = self.child_start(pair[1]);
            if next_start > gap_start {
                self.emit(gap_start, next_start - 1, overlay, Region::Gap, out)?;
            }
        }
        self.write_element(last, out)?;

        let tail_start = self.child_end(last)? + 1;
        if tail_start <= end {
            self.emit(tail_start, end, overlay, Region::Tail, out)?;
        }
        Ok(())
    }

    /// Write the whole document: prolog, root elements and epilog
    pub fn write_document<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let size = self.source.size();
        let roots = self.tree.roots();
        let overlay = self.tree.root_overlay();

        let (Some(&first), Some(&last)) = (roots.first(), roots.last()) else {
            if size > 0 {
                self.emit(0, size - 1, overlay, Region::Gap, out)?;
            }
            return Ok(());
        };

        let first_start = self.child_start(first);
        if first_start > 0 {
            self.emit(0, first_start - 1, overlay, Region::Gap, out)?;
        }
        for pair in roots.windows(2) {
            self.write_element(pair[0], out)?;
            let gap_start = self.child_end(pair[0])? + 1;
            let next_start = self.child_start(pair[1]);
            if next_start > gap_start {
                self.emit(gap_start, next_start - 1, overlay, Region::Gap, out)?;
            }
        }
        self.write_element(last, out)?;

        let epilog_start = self.child_end(last)? + 1;
        if epilog_start < size {
            self.emit(epilog_start, size - 1, overlay, Region::Gap, out)?;
        }
        Ok(())
    }

    /// Serialized bytes of one element
    pub fn fragment(&self, id: NodeId) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_element(id, &mut out)?;
        Ok(out)
    }

    // Child lists only hold live ids; removal through the tree unlinks them
    fn child_start(&self, id: NodeId) -> u64 {
        self.tree.get(id).map_or(0, |e| e.start_offset)
    }

    fn child_end(&self, id: NodeId) -> Result<u64> {
        match self.tree.get(id) {
            Some(e) => e.end_offset.ok_or(Error::UnfinishedElement { start: e.start_offset }),
            None => Ok(0),
        }
    }

    /// Emit the inclusive source range `[from, to]`, leaving out deleted
    /// children and patching if the region has edits
    fn emit<W: Write + ?Sized>(&self, from: u64, to: u64, overlay: &Overlay, region: Region, out: &mut W) -> Result<()> {
        if from > to {
            return Ok(());
        }
        let mut deleted: Vec<(u64, u64)> =
            overlay.deleted_spans.iter().copied().filter(|&(s, e)| from <= s && e <= to).collect();
        deleted.sort_unstable();

        if !region.needs_patch(overlay) {
            let mut pos = from;
            for (s, e) in deleted {
                if s > pos {
                    self.source.copy_range_to(pos, s - 1, out)?;
                }
                pos = pos.max(e + 1);
            }
            if pos <= to {
                self.source.copy_range_to(pos, to, out)?;
            }
            return Ok(());
        }

        // Chunk by chunk, since the region may be wider than the window
        let mut bytes = Vec::with_capacity((to - from + 1) as usize);
        self.source.copy_range_to(from, to, &mut bytes)?;
        for &(s, e) in deleted.iter().rev() {
            bytes.drain((s - from) as usize..=(e - from) as usize);
        }
        match region {
            Region::Leaf => {
                apply_attribute_changes(&mut bytes, &overlay.attr_changes);
                apply_text_changes(&mut bytes, &overlay.text_changes);
            }
            Region::Opening => apply_attribute_changes(&mut bytes, &overlay.attr_changes),
            Region::Tail => apply_tail_text_changes(&mut bytes, &overlay.text_changes),
            Region::Gap => {}
        }
        out.write_all(&bytes)?;
        Ok(())
    }
}
