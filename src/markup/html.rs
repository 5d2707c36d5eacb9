use anyhow::Context;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Element, Node};

const VOID_TAGS: [&str; 12] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// The five XML entities first, then the HTML names editors commonly emit.
fn resolve_html_entity(name: &str) -> Option<&'static str> {
    if let Some(s) = resolve_predefined_entity(name) {
        return Some(s);
    }
    match name {
        "nbsp" => Some("\u{a0}"),
        "shy" => Some("\u{ad}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        _ => None,
    }
}

/// Serializes nodes as XHTML-compatible markup (void elements self-closed).
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(&mut out, nodes);
    out
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
    for n in nodes {
        match n {
            Node::Text { text } => escape_text_into(out, text),
            Node::Element(e) => write_element(out, e),
        }
    }
}

fn write_element(out: &mut String, e: &Element) {
    out.push('<');
    out.push_str(&e.tag);
    for (k, v) in &e.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        escape_attr_into(out, v);
        out.push('"');
    }
    if is_void(&e.tag) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    write_nodes(out, &e.children);
    out.push_str("</");
    out.push_str(&e.tag);
    out.push('>');
}

fn escape_text_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Parses an (X)HTML fragment into nodes.
///
/// Lenient about void elements written HTML-style (`<br>`) and about unmatched
/// closing tags; otherwise the input must be well-formed.
pub fn parse_fragment(html: &str) -> anyhow::Result<Vec<Node>> {
    let mut reader = Reader::from_str(html);
    {
        let cfg = reader.config_mut();
        cfg.trim_text(false);
        cfg.check_end_names = false;
        cfg.allow_unmatched_ends = true;
    }

    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let ev = reader.read_event().context("read markup event")?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                let el = start_element(&s)?;
                if is_void(&el.tag) {
                    append(&mut roots, &mut stack, el.into());
                } else {
                    stack.push(el);
                }
            }
            Event::Empty(s) => {
                let el = start_element(&s)?;
                append(&mut roots, &mut stack, el.into());
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                let Some(pos) = stack.iter().rposition(|el| el.tag == name) else {
                    continue;
                };
                while stack.len() > pos {
                    if let Some(done) = stack.pop() {
                        append(&mut roots, &mut stack, done.into());
                    }
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape_with(resolve_html_entity)
                    .context("unescape markup text")?
                    .into_owned();
                if !text.is_empty() {
                    append(&mut roots, &mut stack, Node::text(text));
                }
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                append(&mut roots, &mut stack, Node::text(text));
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    while let Some(done) = stack.pop() {
        append(&mut roots, &mut stack, done.into());
    }
    Ok(roots)
}

fn start_element(s: &BytesStart<'_>) -> anyhow::Result<Element> {
    let tag = String::from_utf8_lossy(s.name().as_ref()).to_ascii_lowercase();
    let mut el = Element::new(tag);
    for a in s.html_attributes() {
        let a = a.context("markup attribute")?;
        let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
        let val = a
            .unescape_value_with(resolve_html_entity)
            .context("unescape markup attribute")?
            .into_owned();
        el.attrs.push((key, val));
    }
    Ok(el)
}

fn append(roots: &mut Vec<Node>, stack: &mut [Element], node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_html_style_void_elements() {
        let nodes = parse_fragment(r#"<p>a<br>b</p><img src="x.png" alt=hi><hr>"#).unwrap();
        assert_eq!(nodes.len(), 3);
        let p = nodes[0].as_element().unwrap();
        assert_eq!(p.children.len(), 3);
        let img = nodes[1].as_element().unwrap();
        assert_eq!(img.attr("alt"), Some("hi"));
    }

    #[test]
    fn serializer_output_parses_back() {
        let nodes = vec![Element::new("p")
            .with_attr("title", "say \"hi\" & <bye>")
            .with_text("1 < 2 & 3")
            .with_child(Element::new("img").with_attr("src", "data:image/png;base64,AA=="))
            .into()];
        let html = to_html(&nodes);
        assert!(html.contains("<img src=\"data:image/png;base64,AA==\" />"));
        assert_eq!(parse_fragment(&html).unwrap(), nodes);
    }

    #[test]
    fn xml_entities_resolve_in_text_and_attributes() {
        let nodes =
            parse_fragment(r#"<a title="&quot;R&amp;D&quot; &lt;q&gt; &apos;x&apos;">R&amp;D &lt;1&gt; &#38;</a>"#)
                .unwrap();
        let a = nodes[0].as_element().unwrap();
        assert_eq!(a.attr("title"), Some("\"R&D\" <q> 'x'"));
        assert_eq!(a.text_content(), "R&D <1> &");
    }

    #[test]
    fn resolves_nbsp_and_tolerates_stray_end_tags() {
        let nodes = parse_fragment("<p>a&nbsp;b</span></p>").unwrap();
        let p = nodes[0].as_element().unwrap();
        assert_eq!(p.text_content(), "a\u{a0}b");
    }

    #[test]
    fn unclosed_elements_are_closed_at_eof() {
        let nodes = parse_fragment("<ul><li>one<li>two").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].as_element().unwrap().tag, "ul");
    }
}
