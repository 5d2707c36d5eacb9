use std::borrow::Cow;

use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::bytes::Regex;

#[derive(Clone, Debug)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Clone)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

static DECLARED_ENCODING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*?\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("xml encoding declaration regex")
});

/// `encoding="..."` from the XML declaration, when there is one.
fn declared_encoding(xml_bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &xml_bytes[..xml_bytes.len().min(256)];
    let label = DECLARED_ENCODING_RE.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Package parts are UTF-8 in practice. A BOM wins, then the declared
/// encoding; UTF-8 otherwise.
fn decode_part_bytes(xml_bytes: &[u8]) -> Cow<'_, str> {
    let encoding = Encoding::for_bom(xml_bytes)
        .map(|(enc, _)| enc)
        .or_else(|| declared_encoding(xml_bytes))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(xml_bytes);
    text
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let text = decode_part_bytes(xml_bytes);
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    loop {
        let ev = reader.read_event().context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                });
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text: txt });
            }
            Event::CData(t) => {
                let txt = bytes_to_string(t.into_inner());
                events.push(XmlEvent::Text { text: txt });
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a.unescape_value().context("unescape attr")?.into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

#[derive(Clone, Debug)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Element tree over the qualified names as written (`w:p`, `a:blip`, ...).
#[derive(Clone, Debug, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute by local name, ignoring the prefix (`r:embed` matches `embed`).
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn local(&self) -> &str {
        local_name(&self.name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.name == name)
    }

    /// Depth-first search over all descendants.
    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        for e in self.elements() {
            if e.name == name {
                return Some(e);
            }
            if let Some(found) = e.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for c in &self.children {
            if let XmlNode::Text(t) = c {
                out.push_str(t);
            }
        }
        out
    }

    /// `w:val` of a child such as `<w:pStyle w:val="Heading1"/>`.
    pub fn child_val(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.attr("w:val"))
    }

    /// OOXML on/off property: present without `w:val`, or with a truthy one.
    pub fn toggle(&self, name: &str) -> Option<bool> {
        let c = self.child(name)?;
        Some(match c.attr("w:val") {
            None => true,
            Some(v) => !matches!(v, "0" | "false" | "off" | "none"),
        })
    }
}

pub fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Folds a flat event stream into a tree and returns the document element.
pub fn build_tree(part: &XmlPart) -> anyhow::Result<XmlElement> {
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    for ev in &part.events {
        match ev {
            XmlEvent::Start { name, attrs } => stack.push(XmlElement {
                name: name.clone(),
                attrs: attrs.clone(),
                children: Vec::new(),
            }),
            XmlEvent::Empty { name, attrs } => {
                let el = XmlElement {
                    name: name.clone(),
                    attrs: attrs.clone(),
                    children: Vec::new(),
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(el)),
                    None => root = Some(el),
                }
            }
            XmlEvent::End { .. } => {
                let done = stack
                    .pop()
                    .with_context(|| format!("unbalanced end tag in {}", part.name))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(done)),
                    None => root = Some(done),
                }
            }
            XmlEvent::Text { text } => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text.clone()));
                }
            }
        }
    }

    if !stack.is_empty() {
        anyhow::bail!("unclosed elements in {}", part.name);
    }
    root.with_context(|| format!("no document element in {}", part.name))
}

pub fn parse_xml_tree(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlElement> {
    let part = parse_xml_part(name, xml_bytes).with_context(|| format!("parse xml: {name}"))?;
    build_tree(&part)
}
