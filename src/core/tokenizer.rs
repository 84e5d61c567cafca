//! XML Tokenizer - State machine for XML token extraction
//!
//! Pull tokenizer over a byte slice that may stop in the middle of a token.
//! `next_token` returning `None` means one of two things:
//! - the input ends inside a token and more bytes are needed (`error()` is `None`)
//! - the input is malformed (`error()` is `Some`)
//!
//! Trailing text is only reported once the caller marks the input as final,
//! since otherwise the text run could continue in the next read.

use super::scanner::Scanner;
use std::borrow::Cow;

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: <element>
    StartTag,
    /// Element end tag: </element>
    EndTag,
    /// Empty element: <element/>
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: <![CDATA[...]]>
    CData,
    /// Comment: <!--...-->
    Comment,
    /// Processing instruction: <?target ...?>
    ProcessingInstruction,
    /// XML declaration: <?xml ...?>
    XmlDeclaration,
    /// DOCTYPE declaration
    DocType,
}

/// A parsed XML token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end exclusive)
    pub span: (usize, usize),
    /// For tags: the element name
    pub name: Option<&'a [u8]>,
    /// For text/cdata: the content (owned only if entities were decoded)
    pub content: Option<Cow<'a, [u8]>>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token { kind, span, name: None, content: None }
    }

    fn with_name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(name);
        self
    }

    fn with_content(mut self, content: Cow<'a, [u8]>) -> Self {
        self.content = Some(content);
        self
    }
}

/// Malformed-input report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

/// XML tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    is_final: bool,
    error: Option<ParseError>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenizer over a prefix of the document; more bytes may follow
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer { scanner: Scanner::new(input), is_final: false, error: None }
    }

    /// Tokenizer over the final bytes of the document
    pub fn new_final(input: &'a [u8]) -> Self {
        Tokenizer { scanner: Scanner::new(input), is_final: true, error: None }
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Position just past the last complete token
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    fn fail(&mut self, message: impl Into<String>, position: usize) -> Option<Token<'a>> {
        if self.error.is_none() {
            self.error = Some(ParseError { message: message.into(), position });
        }
        None
    }

    /// Get the next complete token
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        if self.error.is_some() || self.scanner.is_eof() {
            return None;
        }
        match self.scanner.peek() {
            Some(b'<') => self.parse_markup(),
            _ => self.parse_text(),
        }
    }

    fn parse_markup(&mut self) -> Option<Token<'a>> {
        let start = self.scanner.position();
        self.scanner.advance(1);
        let token = match self.scanner.peek() {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(_) => self.parse_start_tag(start),
            None => None,
        };
        if token.is_none() {
            // Rewind so the caller can retry with more input
            self.scanner.set_position(start);
        }
        token
    }

    fn parse_start_tag(&mut self, start: usize) -> Option<Token<'a>> {
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => return self.fail("invalid element name", start),
        };
        let end = self.scanner.find_tag_end_quoted()?;
        let is_empty = self.scanner.slice(end - 1, end) == b"/";
        self.scanner.set_position(end + 1);

        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        Some(Token::new(kind, (start, end + 1)).with_name(name))
    }

    fn parse_end_tag(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(1);
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None if self.scanner.is_eof() => return None,
            None => return self.fail("invalid element name in end tag", start),
        };
        let end = self.scanner.find_tag_end()?;
        self.scanner.set_position(end + 1);
        Some(Token::new(TokenKind::EndTag, (start, end + 1)).with_name(name))
    }

    fn parse_bang_markup(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(1);

        if self.scanner.starts_with(b"--") {
            self.scanner.advance(2);
            let content_start = self.scanner.position();
            let pos = self.scanner.find_sequence(b"-->")?;
            let content = self.scanner.slice(content_start, pos);
            self.scanner.set_position(pos + 3);
            Some(Token::new(TokenKind::Comment, (start, pos + 3)).with_content(Cow::Borrowed(content)))
        } else if self.scanner.starts_with(b"[CDATA[") {
            self.scanner.advance(7);
            let content_start = self.scanner.position();
            let pos = self.scanner.find_sequence(b"]]>")?;
            let content = self.scanner.slice(content_start, pos);
            self.scanner.set_position(pos + 3);
            Some(Token::new(TokenKind::CData, (start, pos + 3)).with_content(Cow::Borrowed(content)))
        } else if self.scanner.starts_with(b"DOCTYPE") {
            self.parse_doctype(start)
        } else if self.scanner.could_start_with(b"--")
            || self.scanner.could_start_with(b"[CDATA[")
            || self.scanner.could_start_with(b"DOCTYPE")
        {
            None
        } else {
            self.fail("invalid declaration - expected comment, CDATA, or DOCTYPE", start)
        }
    }

    /// DOCTYPE ends at the first '>' outside quotes and the internal subset
    fn parse_doctype(&mut self, start: usize) -> Option<Token<'a>> {
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut pos = self.scanner.position();
        while pos < self.scanner.len() {
            let b = self.scanner.slice(pos, pos + 1)[0];
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => {
                    self.scanner.set_position(pos + 1);
                    return Some(Token::new(TokenKind::DocType, (start, pos + 1)));
                }
                _ => {}
            }
            pos += 1;
        }
        None
    }

    fn parse_pi(&mut self, start: usize) -> Option<Token<'a>> {
        self.scanner.advance(1);
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None if self.scanner.is_eof() => return None,
            None => return self.fail("invalid processing instruction target", start),
        };
        let pos = self.scanner.find_sequence(b"?>")?;
        self.scanner.set_position(pos + 2);

        let kind = if name == b"xml" { TokenKind::XmlDeclaration } else { TokenKind::ProcessingInstruction };
        Some(Token::new(kind, (start, pos + 2)).with_name(name))
    }

    fn parse_text(&mut self) -> Option<Token<'a>> {
        let start = self.scanner.position();
        let end = match self.scanner.find_tag_start() {
            Some(end) => end,
            None if self.is_final => self.scanner.len(),
            None => return None,
        };
        let content = self.scanner.slice(start, end);
        self.scanner.set_position(end);
        Some(Token::new(TokenKind::Text, (start, end)).with_content(super::entities::decode_text(content)))
    }
}

/// Iterator adapter for tokenizer
impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_element() {
        let mut tok = Tokenizer::new_final(b"<root>content</root>");

        let t1 = tok.next_token().unwrap();
        assert_eq!(t1.kind, TokenKind::StartTag);
        assert_eq!(t1.name, Some(b"root" as &[u8]));
        assert_eq!(t1.span, (0, 6));

        let t2 = tok.next_token().unwrap();
        assert_eq!(t2.kind, TokenKind::Text);
        assert_eq!(t2.content.as_deref(), Some(b"content" as &[u8]));

        let t3 = tok.next_token().unwrap();
        assert_eq!(t3.kind, TokenKind::EndTag);
        assert_eq!(t3.span, (13, 20));
        assert!(tok.next_token().is_none());
        assert!(tok.error().is_none());
    }

    #[test]
    fn test_empty_element() {
        let mut tok = Tokenizer::new(b"<br/>");
        let t = tok.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::EmptyTag);
        assert_eq!(t.name, Some(b"br" as &[u8]));
    }

    #[test]
    fn test_incomplete_tag_rewinds() {
        let mut tok = Tokenizer::new(b"<a>text<b attr=\"x>");
        assert_eq!(tok.next_token().unwrap().kind, TokenKind::StartTag);
        assert_eq!(tok.next_token().unwrap().kind, TokenKind::Text);
        assert!(tok.next_token().is_none());
        assert!(tok.error().is_none());
        assert_eq!(tok.position(), 7);
    }

    #[test]
    fn test_trailing_text_needs_final() {
        let mut tok = Tokenizer::new(b"<a>partial");
        tok.next_token().unwrap();
        assert!(tok.next_token().is_none());
        assert_eq!(tok.position(), 3);

        let mut tok = Tokenizer::new_final(b"<a>partial");
        tok.next_token().unwrap();
        assert_eq!(tok.next_token().unwrap().kind, TokenKind::Text);
        assert_eq!(tok.position(), 10);
    }

    #[test]
    fn test_comment_with_gt_and_split_prefix() {
        let mut tok = Tokenizer::new(b"<!-- a > b -->");
        let t = tok.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::Comment);
        assert_eq!(t.content.as_deref(), Some(b" a > b " as &[u8]));

        let mut tok = Tokenizer::new(b"<!-");
        assert!(tok.next_token().is_none());
        assert!(tok.error().is_none());
    }

    #[test]
    fn test_cdata_and_doctype() {
        let mut tok = Tokenizer::new(b"<!DOCTYPE r [<!ENTITY e \"v>\">]><![CDATA[<x>]]>");
        assert_eq!(tok.next_token().unwrap().kind, TokenKind::DocType);
        let t = tok.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::CData);
        assert_eq!(t.content.as_deref(), Some(b"<x>" as &[u8]));
    }

    #[test]
    fn test_xml_declaration() {
        let mut tok = Tokenizer::new(b"<?xml version=\"1.0\"?><r/>");
        assert_eq!(tok.next_token().unwrap().kind, TokenKind::XmlDeclaration);
        assert_eq!(tok.next_token().unwrap().kind, TokenKind::EmptyTag);
    }

    #[test]
    fn test_malformed_reports_error() {
        let mut tok = Tokenizer::new(b"<a>< 3</a>");
        tok.next_token().unwrap();
        assert!(tok.next_token().is_none());
        let err = tok.error().unwrap();
        assert_eq!(err.position, 3);
    }
}
