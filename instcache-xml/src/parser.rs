//! XML parser implementation.
//!
//! Documents are read with `roxmltree` and copied into an owned
//! [`XmlDocument`] so the result can be shared across threads without
//! keeping the response bytes alive. Input in other encodings is decoded to
//! UTF-8 first. Comments and processing instructions are dropped. DTDs are
//! rejected; inclusions are not resolved and no validation is performed.

use tracing::{debug, instrument};

use instcache_core::error::{InstanceCacheError, Result};
use instcache_core::traits::DocumentParser;
use instcache_core::types::{ParsedDocument, XmlAttribute, XmlDocument, XmlElement, XmlNode};

use crate::encoding::decode;

/// XML parser for shared instances.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlParser;

impl XmlParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parses a string into an owned document.
    pub fn parse_str(&self, text: &str, base_uri: &str) -> Result<XmlDocument> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let document = roxmltree::Document::parse(text).map_err(|e| InstanceCacheError::ParseFailed {
            uri: base_uri.to_string(),
            reason: e.to_string(),
        })?;

        let root = convert_element(document.root_element());
        Ok(XmlDocument::new(root).with_base_uri(base_uri))
    }
}

impl DocumentParser for XmlParser {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn parse(&self, bytes: &[u8], base_uri: &str) -> Result<ParsedDocument> {
        let text = decode(bytes, base_uri)?;

        let document = self.parse_str(&text, base_uri)?;
        debug!(
            base_uri,
            root = %document.root().name,
            elements = document.root().element_count(),
            "Parsed document"
        );
        Ok(ParsedDocument::new(document))
    }
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> XmlElement {
    let tag = node.tag_name();

    let attributes = node
        .attributes()
        .map(|attr| XmlAttribute {
            name: attr.name().to_string(),
            namespace: attr.namespace().map(str::to_string),
            value: attr.value().to_string(),
        })
        .collect();

    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(XmlNode::Element(convert_element(child)))
            } else if child.is_text() {
                child.text().map(|t| XmlNode::Text(t.to_string()))
            } else {
                None
            }
        })
        .collect();

    XmlElement {
        name: tag.name().to_string(),
        namespace: tag.namespace().map(str::to_string),
        attributes,
        children,
    }
}
