//! Immutable in-memory XML documents.
//!
//! A [`ParsedDocument`] is a shared handle to an [`XmlDocument`]. Cache entries
//! and every view derived from them hold clones of the same handle, so the
//! tree is released only when the last of them is dropped.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// An attribute of an element, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Local name
    pub name: String,
    /// Namespace URI, if the attribute is prefixed
    pub namespace: Option<String>,
    /// Unescaped value
    pub value: String,
}

/// A child of an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data, CDATA sections included
    Text(String),
}

/// An element with its attributes and children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name
    pub name: String,
    /// Namespace URI, if any
    pub namespace: Option<String>,
    /// Attributes in document order
    pub attributes: Vec<XmlAttribute>,
    /// Children in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element without namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the value of the first attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Iterates over child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Returns the first child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    /// Concatenated text of this element and all its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Number of elements in this subtree, this one included.
    pub fn element_count(&self) -> usize {
        1 + self.elements().map(XmlElement::element_count).sum::<usize>()
    }
}

/// A parsed XML document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
    base_uri: Option<String>,
}

impl XmlDocument {
    /// Creates a document from its root element.
    pub fn new(root: XmlElement) -> Self {
        Self {
            root,
            base_uri: None,
        }
    }

    /// Sets the URI the document was read from.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    /// Returns the root element.
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Returns the URI the document was read from, if known.
    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared, immutable handle to a parsed document.
///
/// Cloning is cheap and never copies the tree. Use [`ParsedDocument::ptr_eq`]
/// to check whether two handles refer to the same parse.
#[derive(Clone)]
pub struct ParsedDocument(Arc<XmlDocument>);

impl ParsedDocument {
    /// Wraps a freshly parsed document.
    pub fn new(document: XmlDocument) -> Self {
        Self(Arc::new(document))
    }

    /// Returns true if both handles point at the same tree.
    pub fn ptr_eq(a: &ParsedDocument, b: &ParsedDocument) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of live handles (entries and views) sharing this tree.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Deref for ParsedDocument {
    type Target = XmlDocument;

    fn deref(&self) -> &XmlDocument {
        &self.0
    }
}

impl From<XmlDocument> for ParsedDocument {
    fn from(document: XmlDocument) -> Self {
        Self::new(document)
    }
}

impl fmt::Debug for ParsedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedDocument")
            .field("root", &self.0.root.name)
            .field("base_uri", &self.0.base_uri)
            .field("handles", &Arc::strong_count(&self.0))
            .finish()
    }
}
