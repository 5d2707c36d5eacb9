//! DOM-like markup tree shared by every pipeline stage.
//!
//! `IntermediateMarkup` is whatever a decode strategy produced. `NormalizedMarkup`
//! can only be built by the sanitizer and is the only thing the commit stage accepts.

mod html;

pub use html::{parse_fragment, to_html};

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Element(Element),
    Text { text: String },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text { .. } => None,
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text { text } if text.trim().is_empty())
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Element {
    pub tag: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::text(text));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attrs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(pos).1)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// Concatenated descendant text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for n in nodes {
        match n {
            Node::Text { text } => out.push_str(text),
            Node::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// Visits every element in document order.
pub fn walk<'a>(nodes: &'a [Node], f: &mut impl FnMut(&'a Element)) {
    for n in nodes {
        if let Node::Element(e) = n {
            f(e);
            walk(&e.children, f);
        }
    }
}

pub fn count_elements(nodes: &[Node], mut pred: impl FnMut(&Element) -> bool) -> usize {
    let mut count = 0usize;
    walk(nodes, &mut |e| {
        if pred(e) {
            count += 1;
        }
    });
    count
}

/// Image elements that carry a source.
pub fn image_elements(nodes: &[Node]) -> Vec<&Element> {
    let mut out = Vec::new();
    walk(nodes, &mut |e| {
        if e.is("img") && e.attr("src").is_some_and(|s| !s.is_empty()) {
            out.push(e);
        }
    });
    out
}

pub fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    plain_text_into(nodes, &mut out);
    out.trim_end().to_string()
}

fn plain_text_into(nodes: &[Node], out: &mut String) {
    for n in nodes {
        match n {
            Node::Text { text } => out.push_str(text),
            Node::Element(e) => {
                if e.is("br") {
                    out.push('\n');
                    continue;
                }
                plain_text_into(&e.children, out);
                if is_block_tag(&e.tag) && !out.ends_with('\n') {
                    out.push('\n');
                }
                if e.is("td") || e.is("th") {
                    out.push('\t');
                }
            }
        }
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "tr" | "hr" | "div"
    )
}

/// Decoder output before sanitizing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntermediateMarkup {
    nodes: Vec<Node>,
}

impl IntermediateMarkup {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn parse_html(html: &str) -> anyhow::Result<Self> {
        Ok(Self::new(parse_fragment(html)?))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn to_html(&self) -> String {
        to_html(&self.nodes)
    }
}

/// Sanitized markup. Only `sanitize::Normalizer` constructs it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedMarkup {
    nodes: Vec<Node>,
}

impl NormalizedMarkup {
    pub(crate) fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn to_html(&self) -> String {
        to_html(&self.nodes)
    }

    pub fn images(&self) -> Vec<&Element> {
        image_elements(&self.nodes)
    }

    pub fn image_count(&self) -> usize {
        self.images().len()
    }

    pub fn table_count(&self) -> usize {
        count_elements(&self.nodes, |e| e.is("table"))
    }
}

impl From<NormalizedMarkup> for IntermediateMarkup {
    fn from(m: NormalizedMarkup) -> Self {
        IntermediateMarkup::new(m.nodes)
    }
}
