//! A small owned element tree over quick-xml, plus the escape helper the
//! request serializer uses.
//!
//! Element names are stored with their namespace prefix stripped (response
//! documents arrive with varying envelope prefixes), while attribute names
//! are kept verbatim: the wire distinguishes the plain `type` attribute on
//! managed-object references from the `xsi:type` override annotation.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Result;

/// One parsed XML element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Local tag name, prefix stripped.
    pub name: String,
    /// Attributes in document order, names verbatim.
    pub attrs: Vec<(String, String)>,
    /// Concatenated direct text content.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a document into its root element.
    pub fn parse(doc: &str) -> Result<Element> {
        let mut reader = Reader::from_str(doc);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Element::from_start(&start)),
                Event::Empty(start) => {
                    let elem = Element::from_start(&start);
                    attach(&mut stack, &mut root, elem);
                }
                Event::End(_) => {
                    if let Some(elem) = stack.pop() {
                        attach(&mut stack, &mut root, elem);
                    }
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        root.ok_or_else(|| {
            quick_xml::Error::UnexpectedEof("document has no root element".to_string()).into()
        })
    }

    fn from_start(start: &BytesStart) -> Element {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if let Ok(value) = attr.unescape_value() {
                attrs.push((key, value.into_owned()));
            }
        }
        Element {
            name,
            attrs,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute by its verbatim name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Depth-first search for an element with the given local name,
    /// including this element itself.
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.descendant(name))
    }
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, elem: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None => {
            if root.is_none() {
                *root = Some(elem);
            }
        }
    }
}

/// Escape text or attribute content for emission.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
