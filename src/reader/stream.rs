//! Incremental event reader
//!
//! Pulls bytes from a [`WindowedByteSource`]'s sequential cursor into a small
//! buffer, tokenizes every complete token and keeps the unfinished tail for
//! the next read. A refill never crosses a chunk boundary, so the source's
//! current chunk index stays close to the events handed out.

use crate::core::attributes::{local_name, parse_attributes};
use crate::core::scanner::is_whitespace;
use crate::core::tokenizer::{Token, TokenKind, Tokenizer};
use crate::error::{Error, Result};
use crate::reader::events::{Characters, EndElement, StartElement, XmlEvent};
use crate::reader::window::WindowedByteSource;
use std::collections::VecDeque;
use std::sync::Arc;

/// Pull reader producing owned [`XmlEvent`]s
pub struct EventReader {
    source: Arc<WindowedByteSource>,
    /// Unconsumed bytes; `buffer[0]` is at `base_offset`
    buffer: Vec<u8>,
    base_offset: u64,
    read_size: usize,
    pending: VecDeque<XmlEvent>,
    /// Names of open elements, innermost last
    open: Vec<String>,
    error: Option<Error>,
    eof: bool,
    finished: bool,
}

impl EventReader {
    pub fn new(source: Arc<WindowedByteSource>, read_buffer_size: usize) -> Self {
        EventReader {
            source,
            buffer: Vec::with_capacity(read_buffer_size.max(1)),
            base_offset: 0,
            read_size: read_buffer_size.max(1),
            pending: VecDeque::new(),
            open: Vec::new(),
            error: None,
            eof: false,
            finished: false,
        }
    }

    pub fn source(&self) -> &Arc<WindowedByteSource> {
        &self.source
    }

    /// Next event, `Ok(None)` at end of document.
    ///
    /// Events preceding a malformed token are delivered before the error.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if let Some(err) = self.error.take() {
                self.finished = true;
                return Err(err);
            }
            if self.finished {
                return Ok(None);
            }

            if !self.eof && self.fill()? == 0 {
                self.eof = true;
            }
            self.tokenize();
            if self.eof && self.pending.is_empty() && self.error.is_none() {
                self.finish();
            }
        }
    }

    fn fill(&mut self) -> Result<usize> {
        let old_len = self.buffer.len();
        self.buffer.resize(old_len + self.read_size, 0);
        match self.source.read(&mut self.buffer[old_len..]) {
            Ok(n) => {
                self.buffer.truncate(old_len + n);
                Ok(n)
            }
            Err(err) => {
                self.buffer.truncate(old_len);
                Err(err)
            }
        }
    }

    fn tokenize(&mut self) {
        let input = &self.buffer;
        let mut tokenizer = if self.eof { Tokenizer::new_final(input) } else { Tokenizer::new(input) };

        while let Some(token) = tokenizer.next_token() {
            if let Err(err) = translate(input, token, self.base_offset, &mut self.open, &mut self.pending) {
                self.error = Some(err);
                return;
            }
        }
        if let Some(err) = tokenizer.error() {
            self.error = Some(Error::tokenization(self.base_offset + err.position as u64, err.message.clone()));
            return;
        }

        let consumed = tokenizer.position();
        self.buffer.drain(..consumed);
        self.base_offset += consumed as u64;
    }

    /// End of input: anything left over is a truncated document
    fn finish(&mut self) {
        if let Some(i) = self.buffer.iter().position(|b| !is_whitespace(*b)) {
            self.error = Some(Error::tokenization(self.base_offset + i as u64, "unexpected end of document"));
        } else if let Some(name) = self.open.last() {
            self.error = Some(Error::tokenization(self.base_offset, format!("unclosed element <{}>", name)));
        } else {
            self.finished = true;
        }
    }
}

fn name_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(local_name(raw)).into_owned()
}

/// Convert one token to events, checking element nesting
fn translate(
    input: &[u8],
    token: Token<'_>,
    base: u64,
    open: &mut Vec<String>,
    out: &mut VecDeque<XmlEvent>,
) -> Result<()> {
    let (start, end) = token.span;
    let raw_name = token.name.unwrap_or_default();

    match token.kind {
        TokenKind::StartTag | TokenKind::EmptyTag => {
            let name = name_string(raw_name);
            let attributes = parse_attributes(&input[start + 1 + raw_name.len()..end - 1])
                .iter()
                .map(|a| (a.local_name_string(), a.value_string()))
                .collect();

            out.push_back(XmlEvent::StartElement(StartElement {
                name: name.clone(),
                attributes,
                start: base + start as u64,
            }));
            if token.kind == TokenKind::EmptyTag {
                out.push_back(XmlEvent::EndElement(EndElement { name, end: base + end as u64 - 1 }));
            } else {
                open.push(name);
            }
        }
        TokenKind::EndTag => {
            let name = name_string(raw_name);
            match open.pop() {
                Some(expected) if expected == name => {}
                Some(expected) => {
                    return Err(Error::tokenization(
                        base + start as u64,
                        format!("mismatched end tag </{}>, expected </{}>", name, expected),
                    ));
                }
                None => {
                    return Err(Error::tokenization(base + start as u64, format!("unexpected end tag </{}>", name)));
                }
            }
            out.push_back(XmlEvent::EndElement(EndElement { name, end: base + end as u64 - 1 }));
        }
        TokenKind::Text | TokenKind::CData => {
            let text = token.content.map(|c| String::from_utf8_lossy(&c).into_owned()).unwrap_or_default();
            out.push_back(XmlEvent::Characters(Characters { text }));
        }
        TokenKind::Comment | TokenKind::ProcessingInstruction | TokenKind::XmlDeclaration | TokenKind::DocType => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;

    fn read_all(xml: &str, chunk: usize, read_size: usize) -> (Vec<XmlEvent>, Option<Error>) {
        let config = WindowConfig::new().chunk_size(chunk).window_chunks(2);
        let source = Arc::new(WindowedByteSource::from_bytes(xml.as_bytes().to_vec(), &config));
        let mut reader = EventReader::new(source, read_size);
        let mut events = Vec::new();
        loop {
            match reader.next_event() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => return (events, None),
                Err(err) => return (events, Some(err)),
            }
        }
    }

    #[test]
    fn test_offsets_are_absolute() {
        let xml = "<?xml version=\"1.0\"?><a x=\"1\"><b/>text</a>";
        let (events, err) = read_all(xml, 5, 3);
        assert!(err.is_none());

        let a = events[0].as_start_element().unwrap();
        assert_eq!(a.name, "a");
        assert_eq!(a.start, 21);
        assert_eq!(a.attribute("x"), Some("1"));

        let b_start = events[1].as_start_element().unwrap();
        assert_eq!(&xml[b_start.start as usize..b_start.start as usize + 4], "<b/>");
        let b_end = events[2].as_end_element().unwrap();
        assert_eq!(xml.as_bytes()[b_end.end as usize], b'>');
        assert_eq!(b_end.end, b_start.start + 3);

        assert_eq!(events[3].as_text(), Some("text"));
        let a_end = events[4].as_end_element().unwrap();
        assert_eq!(a_end.end as usize, xml.len() - 1);
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_namespace_prefix_stripped() {
        let (events, err) = read_all("<xn:MeContext xn:id=\"CN_01\"></xn:MeContext>", 8, 8);
        assert!(err.is_none());
        let start = events[0].as_start_element().unwrap();
        assert_eq!(start.name, "MeContext");
        assert_eq!(start.attribute("id"), Some("CN_01"));
        assert_eq!(events[1].as_end_element().unwrap().name, "MeContext");
    }

    #[test]
    fn test_split_tokens_across_reads() {
        let xml = "<root><!-- a comment --><item name=\"a &amp; b\">v</item><![CDATA[<raw>]]></root>";
        let (events, err) = read_all(xml, 4, 1);
        assert!(err.is_none());
        assert_eq!(events[1].as_start_element().unwrap().attribute("name"), Some("a & b"));
        assert_eq!(events[2].as_text(), Some("v"));
        assert_eq!(events[4].as_text(), Some("<raw>"));
    }

    #[test]
    fn test_mismatched_end_tag_delivers_prefix() {
        let (events, err) = read_all("<a><b></c></a>", 64, 64);
        assert_eq!(events.len(), 2);
        match err {
            Some(Error::Tokenization { offset, .. }) => assert_eq!(offset, 6),
            other => panic!("expected tokenization error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_document() {
        let (events, err) = read_all("<a><b>text</b", 64, 64);
        assert_eq!(events.len(), 3);
        assert!(matches!(err, Some(Error::Tokenization { .. })));

        let (_, err) = read_all("<a><b/>", 64, 64);
        assert!(matches!(err, Some(Error::Tokenization { .. })));
    }

    #[test]
    fn test_empty_document() {
        let (events, err) = read_all("", 64, 64);
        assert!(events.is_empty());
        assert!(err.is_none());
    }
}
