//! Owned, mutable XML tree.
//!
//! `roxmltree` only produces read-only documents borrowing the source text, so
//! parsed documents are converted into this owned representation. Cloning an
//! [`Element`] is a full recursive copy; no node is ever shared between trees.

use std::fmt::Write as _;

/// XML declaration written in front of every serialized document
pub const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Parse a document and return its root element
    ///
    /// Whitespace-only text, comments and processing instructions are dropped.
    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let document = roxmltree::Document::parse(text)?;
        Ok(Self::from_node(document.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();

        let children = node
            .children()
            .filter_map(|child| {
                if child.is_element() {
                    Some(Node::Element(Self::from_node(child)))
                } else if child.is_text() {
                    child
                        .text()
                        .filter(|text| !text.trim().is_empty())
                        .map(|text| Node::Text(text.to_string()))
                } else {
                    None
                }
            })
            .collect();

        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            children,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    /// First descendant with the given name, in document order (self excluded)
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.find(name)
            }
        })
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.find_mut(name)
            }
        })
    }

    /// Every descendant with the given name, in document order
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in self.elements() {
            child.visit(&mut |element| {
                if element.name == name {
                    found.push(element);
                }
            });
        }
        found
    }

    /// Pre-order walk over this element and all descendants
    pub fn visit<'a, F: FnMut(&'a Element)>(&'a self, f: &mut F) {
        f(self);
        for child in self.elements() {
            child.visit(f);
        }
    }

    pub fn visit_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        for child in self.elements_mut() {
            child.visit_mut(f);
        }
    }

    /// Index in `children` of the first direct child element with the given name
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(element) if element.name == name))
    }

    /// Replace the first direct child with the given name, or append if absent
    pub fn replace_child(&mut self, name: &str, replacement: Element) {
        match self.position_of(name) {
            Some(index) => self.children[index] = Node::Element(replacement),
            None => self.children.push(Node::Element(replacement)),
        }
    }

    /// Drop every direct child, elements and text alike
    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Keep only direct child elements matching the predicate; text is dropped
    pub fn retain_elements<F: FnMut(&Element) -> bool>(&mut self, mut keep: F) {
        self.children.retain(|node| match node {
            Node::Element(element) => keep(element),
            Node::Text(_) => false,
        });
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Serialize as a complete document: prolog followed by the tab-indented tree
    pub fn to_document_string(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_PROLOG);
        self.write_indented(&mut out, 0);
        out.push('\n');
        out
    }

    /// Serialize this element alone, indented with tabs
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_indented(&mut out, 0);
        out
    }

    fn write_indented(&self, out: &mut String, depth: usize) {
        indent(out, depth);
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value));
        }

        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }

        let text_only = self.children.iter().all(|node| matches!(node, Node::Text(_)));
        out.push('>');
        if text_only {
            for node in &self.children {
                if let Node::Text(text) = node {
                    out.push_str(&escape(text));
                }
            }
        } else {
            for node in &self.children {
                out.push('\n');
                match node {
                    Node::Element(element) => element.write_indented(out, depth + 1),
                    Node::Text(text) => {
                        indent(out, depth + 1);
                        out.push_str(&escape(text.trim()));
                    }
                }
            }
            out.push('\n');
            indent(out, depth);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

/// Escape markup characters and whitespace controls, dropping characters XML cannot carry
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // Literal whitespace in attributes is normalized to spaces by parsers
            '\t' => escaped.push_str("&#9;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            c if !is_xml_char(c) => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Characters XML 1.0 allows in a document
fn is_xml_char(c: char) -> bool {
    !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}
