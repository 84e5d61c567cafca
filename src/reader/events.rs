//! XML Event Types
//!
//! Owned events produced by the [`EventReader`](super::EventReader). Element
//! names and attribute keys are local names (namespace prefix stripped).
//! Offsets are absolute byte positions in the source document.

/// XML parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start of an element; also emitted for `<name/>`
    StartElement(StartElement),
    /// Text or CDATA content between tags
    Characters(Characters),
    /// End of an element; also emitted for `<name/>`
    EndElement(EndElement),
}

/// Start element event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Offset of the opening `<`
    pub start: u64,
}

impl StartElement {
    /// Get an attribute value by local name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// End element event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndElement {
    pub name: String,
    /// Offset of the closing `>`, inclusive
    pub end: u64,
}

/// Character data with entities decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characters {
    pub text: String,
}

impl Characters {
    pub fn is_whitespace(&self) -> bool {
        self.text.bytes().all(crate::core::scanner::is_whitespace)
    }
}

impl XmlEvent {
    pub fn as_start_element(&self) -> Option<&StartElement> {
        match self {
            XmlEvent::StartElement(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_end_element(&self) -> Option<&EndElement> {
        match self {
            XmlEvent::EndElement(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if applicable
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlEvent::Characters(c) => Some(&c.text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_element_attribute() {
        let elem = StartElement {
            name: "MeContext".to_string(),
            attributes: vec![("id".to_string(), "CN_01".to_string())],
            start: 42,
        };
        assert_eq!(elem.attribute("id"), Some("CN_01"));
        assert_eq!(elem.attribute("missing"), None);
    }

    #[test]
    fn test_whitespace_characters() {
        assert!(Characters { text: "\n\t  ".to_string() }.is_whitespace());
        assert!(!Characters { text: " x ".to_string() }.is_whitespace());
    }
}
