//! Intermediate markup to normalized markup.
//!
//! A typed tree walk with one local rewrite per node kind. Total over any
//! tree: unknown kinds are dropped, unusable images become placeholders, and
//! nothing here returns an error.

pub mod css;
pub mod rules;

use serde::Serialize;
use tracing::debug;

use crate::markup::{Element, IntermediateMarkup, Node, NormalizedMarkup};
use crate::resource::{
    classify_image_src, classify_mime, image_placeholder, Classification, MimeClass, DEFAULT_ALT_TEXT,
};

use rules::{
    allowed_attrs, canonical_tag, is_block_container, is_internal_class, is_numeric_attr,
    is_safe_href, kind_of, Kind, IMAGE_CLASS, PAGE_BREAK_CLASS, PAGE_BREAK_STYLE, PAGE_BREAK_TEXT,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizeOptions {
    pub fallback_alt: String,
    /// Assigned to images whose payload matches no known signature.
    pub unknown_image_mime: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            fallback_alt: DEFAULT_ALT_TEXT.to_string(),
            unknown_image_mime: "image/jpeg".to_string(),
        }
    }
}

/// What one normalization pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeStats {
    pub dropped_nodes: usize,
    pub unwrapped_nodes: usize,
    pub images_sniffed: usize,
    pub images_defaulted: usize,
    pub image_placeholders: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    options: SanitizeOptions,
}

impl Normalizer {
    pub fn new(mut options: SanitizeOptions) -> Self {
        if let MimeClass::Concrete(canonical) = classify_mime(&options.unknown_image_mime) {
            options.unknown_image_mime = canonical.to_string();
        }
        Self { options }
    }

    pub fn options(&self) -> &SanitizeOptions {
        &self.options
    }

    pub fn normalize(&self, markup: IntermediateMarkup) -> NormalizedMarkup {
        self.normalize_with_stats(markup).0
    }

    pub fn normalize_with_stats(&self, markup: IntermediateMarkup) -> (NormalizedMarkup, SanitizeStats) {
        let mut stats = SanitizeStats::default();
        let nodes = self.children(markup.into_nodes(), None, &mut stats);
        debug!(
            nodes = nodes.len(),
            dropped = stats.dropped_nodes,
            sniffed = stats.images_sniffed,
            defaulted = stats.images_defaulted,
            placeholders = stats.image_placeholders,
            "normalized markup"
        );
        (NormalizedMarkup::new(nodes), stats)
    }

    /// Image rule on its own: a concrete `img`, or a placeholder `span`.
    pub fn normalize_image(&self, el: &Element) -> Element {
        self.image(el, &mut SanitizeStats::default())
    }

    /// Normalizes a sibling list. `parent` is the normalized parent tag.
    fn children(&self, nodes: Vec<Node>, parent: Option<&str>, stats: &mut SanitizeStats) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Text { text } => {
                    let blank = text.trim().is_empty();
                    let in_container = parent.map_or(true, is_block_container);
                    if !(blank && in_container) && !text.is_empty() {
                        out.push(Node::Text { text });
                    }
                }
                Node::Element(el) => out.extend(self.element(el, parent, stats)),
            }
        }
        let out = merge_adjacent_text(out);
        match parent {
            Some("ul") | Some("ol") => self.list_items(out, stats),
            Some("table") | Some("thead") | Some("tbody") | Some("tfoot") => {
                self.keep_only(out, parent, &["thead", "tbody", "tfoot", "tr"], stats)
            }
            Some("tr") => self.keep_only(out, parent, &["td", "th"], stats),
            _ => {
                let out = self.wrap_orphan_rows(out, stats);
                self.wrap_orphan_items(out)
            }
        }
    }

    fn element(&self, el: Element, parent: Option<&str>, stats: &mut SanitizeStats) -> Vec<Node> {
        let tag = canonical_tag(&el.tag);
        if tag == "div" && el.has_class(PAGE_BREAK_CLASS) {
            return vec![page_break_marker(&el).into()];
        }
        match kind_of(&tag) {
            Kind::Drop => {
                debug!(tag = %el.tag, "dropping unsupported element");
                stats.dropped_nodes += 1;
                Vec::new()
            }
            Kind::Unwrap => {
                stats.unwrapped_nodes += 1;
                self.children(el.children, parent, stats)
            }
            Kind::Keep(injected) => match tag.as_str() {
                "img" => vec![self.image(&el, stats).into()],
                "a" => self.link(el, stats),
                "span" => self.span(el, stats),
                _ => {
                    let attrs = clean_attrs(&el, &tag, injected);
                    let children = self.children(el.children, Some(&tag), stats);
                    if tag == "table" && !has_cells(&children) {
                        debug!("dropping table without cells");
                        stats.dropped_nodes += 1;
                        return Vec::new();
                    }
                    let mut out = Element::new(tag);
                    out.attrs = attrs;
                    out.children = children;
                    vec![out.into()]
                }
            },
        }
    }

    fn image(&self, el: &Element, stats: &mut SanitizeStats) -> Element {
        let classified = classify_image_src(
            el.attr("src").unwrap_or_default(),
            el.attr("alt"),
            &self.options.fallback_alt,
            &self.options.unknown_image_mime,
        );
        match classified {
            Ok(classification) => {
                match &classification {
                    Classification::Sniffed(r) => {
                        stats.images_sniffed += 1;
                        debug!(mime = %r.mime_type, "reclassified image from payload signature");
                    }
                    Classification::Defaulted(r) => {
                        stats.images_defaulted += 1;
                        debug!(mime = %r.mime_type, "no image signature matched, using fallback type");
                    }
                    Classification::Declared(_) => {}
                }
                let resource = classification.into_resource();
                let mut img = Element::new("img")
                    .with_attr("src", resource.to_data_uri())
                    .with_attr("alt", resource.alt_text.clone());
                for name in ["title", "width", "height"] {
                    if let Some(v) = el.attr(name).filter(|v| attr_value_ok(name, v)) {
                        img.set_attr(name, v.trim());
                    }
                }
                let mut classes: Vec<String> = kept_classes(el);
                if !classes.iter().any(|c| c == IMAGE_CLASS) {
                    classes.insert(0, IMAGE_CLASS.to_string());
                }
                img.set_attr("class", classes.join(" "));
                img.set_attr("style", css::merge(rules::IMAGE_STYLE, el.attr("style")));
                img
            }
            Err(reason) => {
                stats.image_placeholders += 1;
                debug!(?reason, "image replaced by placeholder");
                image_placeholder(el.attr("alt"))
            }
        }
    }

    fn link(&self, el: Element, stats: &mut SanitizeStats) -> Vec<Node> {
        let safe = el.attr("href").is_some_and(is_safe_href);
        let attrs = clean_attrs(&el, "a", None);
        let children = self.children(el.children, Some("a"), stats);
        if !safe {
            stats.unwrapped_nodes += 1;
            return children;
        }
        let mut a = Element::new("a");
        a.attrs = attrs;
        a.children = children;
        vec![a.into()]
    }

    /// Spans survive only while they still carry presentation.
    fn span(&self, el: Element, stats: &mut SanitizeStats) -> Vec<Node> {
        let attrs = clean_attrs(&el, "span", None);
        let children = self.children(el.children, Some("span"), stats);
        if attrs.is_empty() {
            stats.unwrapped_nodes += 1;
            return children;
        }
        let mut span = Element::new("span");
        span.attrs = attrs;
        span.children = children;
        vec![span.into()]
    }

    /// Every child of a list is an item; stray nested lists join the previous item.
    fn list_items(&self, nodes: Vec<Node>, stats: &mut SanitizeStats) -> Vec<Node> {
        let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Node::Element(el) = &node {
                if el.is("li") {
                    out.push(node);
                    continue;
                }
                if el.is("ul") || el.is("ol") {
                    if let Some(Node::Element(prev)) = out.last_mut() {
                        prev.children.push(node);
                        continue;
                    }
                }
            }
            let li = Element::new("li").with_child(node);
            out.extend(self.element(li, Some("ul"), stats));
        }
        out
    }

    fn keep_only(
        &self,
        nodes: Vec<Node>,
        parent: Option<&str>,
        allowed: &[&str],
        stats: &mut SanitizeStats,
    ) -> Vec<Node> {
        nodes
            .into_iter()
            .filter(|n| {
                let ok = n.as_element().is_some_and(|e| allowed.iter().any(|a| e.is(a)));
                if !ok {
                    debug!(parent = ?parent, "dropping illegal table child");
                    stats.dropped_nodes += 1;
                }
                ok
            })
            .collect()
    }

    /// Runs of rows, cells and row groups outside any table get a `table` of
    /// their own; loose cells share one row. Runs without cells are dropped.
    fn wrap_orphan_rows(&self, nodes: Vec<Node>, stats: &mut SanitizeStats) -> Vec<Node> {
        if !nodes.iter().any(is_table_part) {
            return nodes;
        }
        let mut out = Vec::with_capacity(nodes.len());
        let mut run: Vec<Node> = Vec::new();
        let flush = |run: &mut Vec<Node>, out: &mut Vec<Node>, stats: &mut SanitizeStats| {
            if run.is_empty() {
                return;
            }
            let parts = std::mem::take(run);
            if !has_cells(&parts) {
                debug!(parts = parts.len(), "dropping orphan rows without cells");
                stats.dropped_nodes += 1;
                return;
            }
            let mut table = Element::new("table");
            table.attrs = clean_attrs(&table, "table", Some(injected_style("table")));
            let mut row: Option<Element> = None;
            for part in parts {
                let is_cell = part.as_element().is_some_and(|e| e.is("td") || e.is("th"));
                if is_cell {
                    let tr = row.get_or_insert_with(|| {
                        let mut tr = Element::new("tr");
                        tr.attrs = clean_attrs(&tr, "tr", Some(injected_style("tr")));
                        tr
                    });
                    tr.children.push(part);
                } else {
                    if let Some(tr) = row.take() {
                        table.children.push(tr.into());
                    }
                    table.children.push(part);
                }
            }
            if let Some(tr) = row.take() {
                table.children.push(tr.into());
            }
            debug!(children = table.children.len(), "wrapped orphan table rows");
            out.push(table.into());
        };
        for node in nodes {
            if is_table_part(&node) {
                run.push(node);
            } else if node.is_blank_text() && !run.is_empty() {
                continue;
            } else {
                flush(&mut run, &mut out, stats);
                out.push(node);
            }
        }
        flush(&mut run, &mut out, stats);
        out
    }

    /// Runs of `li` outside any list get a `ul` of their own.
    fn wrap_orphan_items(&self, nodes: Vec<Node>) -> Vec<Node> {
        if !nodes.iter().any(|n| n.as_element().is_some_and(|e| e.is("li"))) {
            return nodes;
        }
        let mut out = Vec::with_capacity(nodes.len());
        let mut run: Vec<Node> = Vec::new();
        let flush = |run: &mut Vec<Node>, out: &mut Vec<Node>| {
            if run.is_empty() {
                return;
            }
            let mut ul = Element::new("ul");
            ul.attrs = clean_attrs(&ul, "ul", Some(injected_style("ul")));
            ul.children = std::mem::take(run);
            debug!(items = ul.children.len(), "wrapped orphan list items");
            out.push(ul.into());
        };
        for node in nodes {
            let is_li = node.as_element().is_some_and(|e| e.is("li"));
            if is_li {
                run.push(node);
            } else if node.is_blank_text() && !run.is_empty() {
                continue;
            } else {
                flush(&mut run, &mut out);
                out.push(node);
            }
        }
        flush(&mut run, &mut out);
        out
    }
}

fn injected_style(tag: &str) -> &'static str {
    match kind_of(tag) {
        Kind::Keep(Some(style)) => style,
        _ => "",
    }
}

fn is_table_part(node: &Node) -> bool {
    node.as_element().is_some_and(|e| {
        ["tr", "td", "th", "tbody", "thead", "tfoot"]
            .iter()
            .any(|t| e.is(t))
    })
}

fn kept_classes(el: &Element) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in el.classes() {
        if !is_internal_class(c) && !out.iter().any(|o| o == c) {
            out.push(c.to_string());
        }
    }
    out
}

fn attr_value_ok(name: &str, value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return false;
    }
    !is_numeric_attr(name) || v.parse::<u32>().is_ok()
}

/// Allow-listed attributes in a fixed order, then `class`, then merged `style`.
fn clean_attrs(el: &Element, tag: &str, injected: Option<&str>) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for name in allowed_attrs(tag) {
        if let Some(v) = el.attr(name).filter(|v| attr_value_ok(name, v)) {
            if *name == "href" && !is_safe_href(v) {
                continue;
            }
            attrs.push((name.to_string(), v.trim().to_string()));
        }
    }
    let classes = kept_classes(el);
    if !classes.is_empty() {
        attrs.push(("class".to_string(), classes.join(" ")));
    }
    let style = match injected {
        Some(injected) => css::merge(injected, el.attr("style")),
        None => css::merge("", el.attr("style")),
    };
    if !style.is_empty() {
        attrs.push(("style".to_string(), style));
    }
    attrs
}

fn page_break_marker(el: &Element) -> Element {
    Element::new("div")
        .with_attr("class", PAGE_BREAK_CLASS)
        .with_attr("style", css::merge(PAGE_BREAK_STYLE, el.attr("style")))
        .with_text(PAGE_BREAK_TEXT)
}

fn has_cells(nodes: &[Node]) -> bool {
    crate::markup::count_elements(nodes, |e| e.is("td") || e.is("th")) > 0
}

fn merge_adjacent_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match (out.last_mut(), node) {
            (Some(Node::Text { text: prev }), Node::Text { text }) => prev.push_str(&text),
            (_, node) => out.push(node),
        }
    }
    out
}
