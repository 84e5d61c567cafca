//! Byte-level splicing of recorded edits
//!
//! Edits are applied to a copy of the element's source bytes, one log entry
//! at a time, so later entries see the result of earlier ones. Only the
//! opening tag (attributes) and the text region are ever touched; all other
//! bytes come through unchanged.

use super::node::{AttributeChange, AttributeChangeKind, Overlay, TextChange, TextChangeKind};
use crate::core::attributes::local_name;
use crate::core::entities::escape_text;
use crate::core::scanner::{find_tag_end_quoted, is_name_char, is_whitespace};
use memchr::memmem;

/// Location of one attribute inside an opening tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttributeSpan {
    /// First whitespace byte before the name
    lead: usize,
    /// First byte of the value, after the opening quote
    value_start: usize,
    /// Closing quote
    value_end: usize,
}

/// Find attribute `key` in `tag`, which starts at `<` and ends before `>`.
///
/// Matches the full attribute name first, then the local name after a prefix.
fn find_attribute(tag: &[u8], key: &str) -> Option<AttributeSpan> {
    let key = key.as_bytes();
    let mut local_match = None;
    let mut pos = 1;
    while pos < tag.len() && is_name_char(tag[pos]) {
        pos += 1;
    }

    while pos < tag.len() {
        let lead = pos;
        while pos < tag.len() && is_whitespace(tag[pos]) {
            pos += 1;
        }
        let name_start = pos;
        while pos < tag.len() && is_name_char(tag[pos]) {
            pos += 1;
        }
        if pos == name_start {
            break;
        }
        let name = &tag[name_start..pos];
        while pos < tag.len() && (is_whitespace(tag[pos]) || tag[pos] == b'=') {
            pos += 1;
        }
        let quote = *tag.get(pos)?;
        if quote != b'"' && quote != b'\'' {
            break;
        }
        let value_start = pos + 1;
        let value_end = value_start + memchr::memchr(quote, &tag[value_start..])?;
        let span = AttributeSpan { lead, value_start, value_end };
        if name == key {
            return Some(span);
        }
        if local_match.is_none() && local_name(name) == key {
            local_match = Some(span);
        }
        pos = value_end + 1;
    }
    local_match
}

/// Index of the `>` closing the opening tag at the start of `bytes`
fn opening_tag_end(bytes: &[u8]) -> Option<usize> {
    find_tag_end_quoted(bytes)
}

fn is_empty_tag(bytes: &[u8], tag_end: usize) -> bool {
    tag_end > 0 && bytes[tag_end - 1] == b'/'
}

fn splice(bytes: &mut Vec<u8>, range: std::ops::Range<usize>, with: &[u8]) {
    bytes.splice(range, with.iter().copied());
}

/// Apply one attribute change to the opening tag at the start of `bytes`
fn apply_attribute_change(bytes: &mut Vec<u8>, change: &AttributeChange) {
    let Some(tag_end) = opening_tag_end(bytes) else {
        return;
    };
    let value = escape_text(&change.value);
    match change.kind {
        AttributeChangeKind::Add => {
            let insert_at = if is_empty_tag(bytes, tag_end) { tag_end - 1 } else { tag_end };
            let attr = format!(" {}=\"{}\"", change.key, value);
            splice(bytes, insert_at..insert_at, attr.as_bytes());
        }
        AttributeChangeKind::Modify => {
            if let Some(span) = find_attribute(&bytes[..tag_end], &change.key) {
                splice(bytes, span.value_start..span.value_end, value.as_bytes());
            }
        }
        AttributeChangeKind::Remove => {
            if let Some(span) = find_attribute(&bytes[..tag_end], &change.key) {
                splice(bytes, span.lead..span.value_end + 1, b"");
            }
        }
    }
}

/// Apply every attribute change in log order
pub fn apply_attribute_changes(bytes: &mut Vec<u8>, changes: &[AttributeChange]) {
    for change in changes {
        apply_attribute_change(bytes, change);
    }
}

fn apply_text_change(bytes: &mut Vec<u8>, region: std::ops::Range<usize>, change: &TextChange) {
    let value = escape_text(&change.value);
    match change.kind {
        TextChangeKind::Append => splice(bytes, region.end..region.end, value.as_bytes()),
        TextChangeKind::Modify => splice(bytes, region, value.as_bytes()),
        TextChangeKind::Remove => splice(bytes, region, b""),
    }
}

/// Turn `<name .../>` into `<name ...></name>` so it can hold text
fn expand_empty_tag(bytes: &mut Vec<u8>, tag_end: usize) {
    let name_end = bytes[1..].iter().position(|&b| !is_name_char(b)).map_or(bytes.len(), |i| i + 1);
    let mut closing = b"></".to_vec();
    closing.extend_from_slice(&bytes[1..name_end]);
    closing.push(b'>');
    splice(bytes, tag_end - 1..tag_end + 1, &closing);
}

/// Apply text changes to a leaf element: the region between the opening
/// tag's `>` and the first following `</`
pub fn apply_text_changes(bytes: &mut Vec<u8>, changes: &[TextChange]) {
    for change in changes {
        let Some(tag_end) = opening_tag_end(bytes) else {
            return;
        };
        if is_empty_tag(bytes, tag_end) {
            if change.kind == TextChangeKind::Remove {
                continue;
            }
            expand_empty_tag(bytes, tag_end);
        }
        let Some(tag_end) = opening_tag_end(bytes) else {
            return;
        };
        let start = tag_end + 1;
        let Some(end) = memmem::find(&bytes[start..], b"</").map(|i| start + i) else {
            return;
        };
        apply_text_change(bytes, start..end, change);
    }
}

/// Apply text changes to the tail of an element with children: the region
/// from the start of `bytes` (just after the last child) to the first `</`
pub fn apply_tail_text_changes(bytes: &mut Vec<u8>, changes: &[TextChange]) {
    for change in changes {
        let Some(end) = memmem::find(bytes, b"</") else {
            return;
        };
        apply_text_change(bytes, 0..end, change);
    }
}

/// Patched copy of a whole leaf element
pub fn patch_leaf(source: &[u8], overlay: &Overlay) -> Vec<u8> {
    let mut bytes = source.to_vec();
    apply_attribute_changes(&mut bytes, &overlay.attr_changes);
    apply_text_changes(&mut bytes, &overlay.text_changes);
    bytes
}
