//! XML Attribute Parsing
//!
//! Lenient attribute parsing over the raw bytes between an element name and
//! its closing `>` or `/>`.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use memchr::memchr;
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name (may include namespace prefix)
    pub name: &'a [u8],
    /// Attribute value (entities decoded)
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    /// Name without its namespace prefix
    pub fn local_name(&self) -> &'a [u8] {
        local_name(self.name)
    }

    pub fn local_name_string(&self) -> String {
        String::from_utf8_lossy(self.local_name()).into_owned()
    }

    pub fn value_string(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// Strip a namespace prefix (`xn:MeContext` -> `MeContext`)
pub fn local_name(name: &[u8]) -> &[u8] {
    match memchr(b':', name) {
        Some(colon) => &name[colon + 1..],
        None => name,
    }
}

/// Parse attributes from raw tag content (after the element name)
pub fn parse_attributes(input: &[u8]) -> Vec<Attribute<'_>> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] == b'/' || input[pos] == b'>' {
            break;
        }
        if !is_name_start_char(input[pos]) {
            pos += 1;
            continue;
        }

        let name_start = pos;
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] != b'=' {
            // Attribute without value
            attrs.push(Attribute { name, value: Cow::Borrowed(b"") });
            continue;
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }

        let quote = input[pos];
        if quote != b'"' && quote != b'\'' {
            let value_start = pos;
            while pos < input.len() && !is_whitespace(input[pos]) && input[pos] != b'/' && input[pos] != b'>' {
                pos += 1;
            }
            attrs.push(Attribute { name, value: decode_text(&input[value_start..pos]) });
            continue;
        }

        pos += 1;
        let value_start = pos;
        let value_end = memchr(quote, &input[pos..]).map_or(input.len(), |i| pos + i);
        attrs.push(Attribute { name, value: decode_text(&input[value_start..value_end]) });
        pos = value_end + 1;
    }

    attrs
}
