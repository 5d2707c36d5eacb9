//! Body model to markup. The strategies differ only in their `Flavor`.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::docx::body::{
    BodyBlock, DrawingImage, Hyperlink, Inline, NumberingRef, Paragraph, Run, RunContent, RunProps,
    Table, TableCell, VMerge, VertAlign,
};
use crate::docx::numbering::ListKind;
use crate::docx::{MediaPart, OpenedDocx};
use crate::markup::{Element, IntermediateMarkup, Node};
use crate::resource::image_placeholder;

use super::image::{EmbeddedImage, ImageConversion};
use super::style_map::{Selector, Target};
use super::{DecodeMessage, DecodeOptions, Decoded, PageBreakPolicy};

/// Built-in styles Word applies implicitly; never worth a warning.
const IMPLICIT_STYLES: [&str; 5] = [
    "Normal",
    "Default Paragraph Font",
    "Hyperlink",
    "Table Grid",
    "Normal Table",
];

/// Strategy-specific presentation hooks.
pub(crate) trait Flavor {
    fn image_content_type(&self, media: &MediaPart<'_>) -> String;

    fn decorate_paragraph(&self, _p: &Paragraph, _el: &mut Element) {}

    fn decorate_run(&self, _props: &RunProps, nodes: Vec<Node>) -> Vec<Node> {
        nodes
    }

    fn decorate_list(&self, _num: NumberingRef, _el: &mut Element) {}

    fn decorate_table(&self, _table: &Table, _el: &mut Element) {}

    fn decorate_cell(&self, _cell: &TableCell, _el: &mut Element) {}

    fn decorate_image(&self, _img: &DrawingImage, _el: &mut Element) {}

    fn tab(&self) -> Node {
        Node::text("\t")
    }

    fn bookmark(&self, _name: &str) -> Option<Node> {
        None
    }

    fn keep_empty_paragraphs(&self) -> bool {
        false
    }

    fn wrap_rows(&self, rows: Vec<Node>) -> Vec<Node> {
        rows
    }

    fn wrap_document(&self, nodes: Vec<Node>) -> Vec<Node> {
        nodes
    }
}

pub(crate) struct Emitter<'a, F: Flavor> {
    docx: &'a OpenedDocx,
    options: &'a DecodeOptions,
    flavor: &'a F,
    messages: Vec<DecodeMessage>,
    warned_styles: HashSet<String>,
}

impl<'a, F: Flavor> Emitter<'a, F> {
    pub fn new(docx: &'a OpenedDocx, options: &'a DecodeOptions, flavor: &'a F) -> Self {
        Self {
            docx,
            options,
            flavor,
            messages: Vec::new(),
            warned_styles: HashSet::new(),
        }
    }

    pub fn run(mut self) -> Decoded {
        let docx = self.docx;
        let nodes = self.blocks(&docx.body);
        Decoded {
            markup: IntermediateMarkup::new(self.flavor.wrap_document(nodes)),
            messages: self.messages,
        }
    }

    fn warn(&mut self, message: String) {
        warn!(%message, "decode warning");
        self.messages.push(DecodeMessage::warning(message));
    }

    fn note_unmapped(&mut self, kind: &str, id: &str, name: &str) {
        if IMPLICIT_STYLES.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            return;
        }
        if self.warned_styles.insert(format!("{kind}:{id}")) {
            self.warn(format!("Unrecognised {kind} style: '{name}' (Style ID: {id})"));
        }
    }

    fn blocks(&mut self, blocks: &[BodyBlock]) -> Vec<Node> {
        let mut out = Vec::new();
        let mut lists = ListNester::default();
        for block in blocks {
            match block {
                BodyBlock::Paragraph(p) => self.paragraph(p, &mut lists, &mut out),
                BodyBlock::Table(t) => {
                    lists.finish(&mut out);
                    if let Some(table) = self.table(t) {
                        out.push(table.into());
                    }
                }
            }
        }
        lists.finish(&mut out);
        out
    }

    fn page_break(&self) -> Option<Node> {
        match self.options.page_breaks {
            PageBreakPolicy::HorizontalRule => Some(Element::new("hr").into()),
            PageBreakPolicy::Marker => Some(
                Element::new("div")
                    .with_attr("class", "page-break")
                    .with_text("Page Break")
                    .into(),
            ),
            PageBreakPolicy::Ignore => None,
        }
    }

    fn push_page_break(&self, lists: &mut ListNester, out: &mut Vec<Node>) {
        if let Some(node) = self.page_break() {
            lists.finish(out);
            out.push(node);
        }
    }

    /// Tag and classes for a paragraph, or `None` when a rule drops it.
    fn paragraph_target(&mut self, p: &Paragraph) -> Option<(String, Vec<String>)> {
        let docx = self.docx;
        let options = self.options;
        let style_map = &options.style_map;
        let style = p
            .style_id
            .as_deref()
            .map(|id| (id, docx.styles.paragraph_name(id)));

        if let Some((_, name)) = style {
            if style_map.names(Selector::Paragraph, name) {
                return match style_map.lookup(Selector::Paragraph, Some(name)) {
                    Some(Target::Element { tag, classes }) => Some((tag.clone(), classes.clone())),
                    Some(Target::Ignore) => None,
                    None => Some(("p".to_string(), Vec::new())),
                };
            }
        }

        let outline = p
            .outline_lvl
            .or_else(|| p.style_id.as_deref().and_then(|id| docx.styles.paragraph_outline_lvl(id)))
            .filter(|lvl| *lvl < 6);
        if let Some(lvl) = outline {
            return Some((format!("h{}", lvl + 1), Vec::new()));
        }

        if let Some((id, name)) = style {
            if p.numbering.is_none() {
                self.note_unmapped("paragraph", id, name);
            }
        }
        match style_map.lookup(Selector::Paragraph, style.map(|(_, n)| n)) {
            Some(Target::Element { tag, classes }) => Some((tag.clone(), classes.clone())),
            Some(Target::Ignore) => None,
            None => Some(("p".to_string(), Vec::new())),
        }
    }

    fn paragraph(&mut self, p: &Paragraph, lists: &mut ListNester, out: &mut Vec<Node>) {
        if p.page_break_before {
            self.push_page_break(lists, out);
        }
        let Some((tag, classes)) = self.paragraph_target(p) else {
            if p.has_page_break() {
                self.push_page_break(lists, out);
            }
            return;
        };
        if tag == "hr" {
            lists.finish(out);
            out.push(Element::new("hr").into());
            return;
        }

        let mut children: Vec<Node> = p
            .bookmarks
            .iter()
            .filter_map(|b| self.flavor.bookmark(b))
            .collect();
        children.extend(self.inlines(p));

        // Numbered headings stay headings.
        if tag == "li" || (p.numbering.is_some() && tag == "p") {
            let num = p.numbering.unwrap_or(NumberingRef { num_id: 0, ilvl: 0 });
            let kind = match p.numbering {
                Some(n) => self.docx.numbering.list_kind(n.num_id, n.ilvl),
                None => ListKind::Unordered,
            };
            let mut list = Element::new(match kind {
                ListKind::Ordered => "ol",
                ListKind::Unordered => "ul",
            });
            self.flavor.decorate_list(num, &mut list);
            let mut li = Element::new("li");
            set_classes(&mut li, &classes);
            li.children = children;
            lists.push(num.num_id, num.ilvl, list, li, out);
        } else if has_content(&children) || self.flavor.keep_empty_paragraphs() {
            lists.finish(out);
            let mut el = Element::new(tag);
            set_classes(&mut el, &classes);
            self.flavor.decorate_paragraph(p, &mut el);
            el.children = children;
            out.push(el.into());
        }

        if p.has_page_break() {
            self.push_page_break(lists, out);
        }
    }

    fn inlines(&mut self, p: &Paragraph) -> Vec<Node> {
        let mut out = Vec::new();
        for inline in &p.content {
            match inline {
                Inline::Run(r) => out.extend(self.text_run(r)),
                Inline::Hyperlink(h) => {
                    let mut children = Vec::new();
                    for r in &h.runs {
                        children.extend(self.text_run(r));
                    }
                    match self.link_href(h) {
                        Some(href) => {
                            let mut a = Element::new("a").with_attr("href", href);
                            a.children = children;
                            out.push(a.into());
                        }
                        None => out.extend(children),
                    }
                }
            }
        }
        out
    }

    fn link_href(&self, h: &Hyperlink) -> Option<String> {
        let external = h
            .rel_id
            .as_deref()
            .and_then(|id| self.docx.hyperlink_target(id));
        match (external, h.anchor.as_deref()) {
            (Some(url), Some(anchor)) => Some(format!("{url}#{anchor}")),
            (Some(url), None) => Some(url.to_string()),
            (None, Some(anchor)) => Some(format!("#{anchor}")),
            (None, None) => None,
        }
    }

    fn text_run(&mut self, r: &Run) -> Vec<Node> {
        let docx = self.docx;
        let style = r
            .props
            .style_id
            .as_deref()
            .map(|id| (id, docx.styles.character_name(id)));
        let target = style.and_then(|(_, name)| {
            self.options
                .style_map
                .lookup(Selector::Run, Some(name))
                .cloned()
        });
        if target == Some(Target::Ignore) {
            return Vec::new();
        }
        if let (None, Some((id, name))) = (&target, style) {
            self.note_unmapped("run", id, name);
        }

        let mut nodes = Vec::new();
        let mut text = String::new();
        let flush = |text: &mut String, nodes: &mut Vec<Node>| {
            if !text.is_empty() {
                nodes.push(Node::text(std::mem::take(text)));
            }
        };
        for c in &r.content {
            match c {
                RunContent::Text(t) => text.push_str(t),
                RunContent::Tab => {
                    flush(&mut text, &mut nodes);
                    nodes.push(self.flavor.tab());
                }
                RunContent::LineBreak => {
                    flush(&mut text, &mut nodes);
                    nodes.push(Element::new("br").into());
                }
                // Emitted after the paragraph.
                RunContent::PageBreak => {}
                RunContent::Image(img) => {
                    flush(&mut text, &mut nodes);
                    nodes.push(self.image(img));
                }
            }
        }
        flush(&mut text, &mut nodes);
        if nodes.is_empty() {
            return nodes;
        }

        let props = &r.props;
        let mut wrapped = nodes;
        match props.vert_align {
            Some(VertAlign::Superscript) => wrapped = wrap("sup", wrapped),
            Some(VertAlign::Subscript) => wrapped = wrap("sub", wrapped),
            None => {}
        }
        if props.strike {
            wrapped = wrap("s", wrapped);
        }
        if props.underline {
            wrapped = wrap("u", wrapped);
        }
        if props.italic {
            wrapped = wrap("em", wrapped);
        }
        if props.bold {
            wrapped = wrap("strong", wrapped);
        }
        if let Some(Target::Element { tag, classes }) = target {
            let duplicate = (tag == "strong" && props.bold) || (tag == "em" && props.italic);
            if !duplicate {
                let mut el = Element::new(tag);
                set_classes(&mut el, &classes);
                el.children = wrapped;
                wrapped = vec![el.into()];
            }
        }
        self.flavor.decorate_run(props, wrapped)
    }

    fn image(&mut self, img: &DrawingImage) -> Node {
        let docx = self.docx;
        let media = match docx.media(&img.rel_id) {
            Ok(media) => media,
            Err(e) => {
                self.warn(format!("Image could not be imported: {e}"));
                return image_placeholder(img.alt.as_deref()).into();
            }
        };
        let content_type = self.flavor.image_content_type(&media);
        let embedded = EmbeddedImage {
            part_name: &media.part_name,
            bytes: media.bytes,
            content_type: &content_type,
            alt_text: img.alt.as_deref(),
        };
        match self.options.image_handler.convert(&embedded) {
            ImageConversion::Resource(resource) => {
                let mut el = resource.to_element();
                self.flavor.decorate_image(img, &mut el);
                el.into()
            }
            ImageConversion::Failed(reason) => {
                self.warn(format!("Image could not be imported: {reason}"));
                image_placeholder(img.alt.as_deref()).into()
            }
        }
    }

    fn table(&mut self, t: &Table) -> Option<Element> {
        let docx = self.docx;
        let style_name = t.style_id.as_deref().map(|id| docx.styles.table_name(id));
        let (tag, classes) = match self.options.style_map.lookup(Selector::Table, style_name) {
            Some(Target::Element { tag, classes }) => (tag.clone(), classes.clone()),
            Some(Target::Ignore) => return None,
            None => ("table".to_string(), Vec::new()),
        };

        // Cells plus their rowspan; vertical merges extend the cell that started them.
        let mut rows: Vec<Vec<(Element, usize)>> = Vec::with_capacity(t.rows.len());
        let mut merge_origins: HashMap<usize, (usize, usize)> = HashMap::new();
        for (ri, row) in t.rows.iter().enumerate() {
            let mut cells = Vec::with_capacity(row.cells.len());
            let mut col = 0usize;
            for cell in &row.cells {
                let span = cell.grid_span.max(1) as usize;
                if cell.v_merge == Some(VMerge::Continue) {
                    if let Some(&(r0, c0)) = merge_origins.get(&col) {
                        if let Some(origin) = rows.get_mut(r0).and_then(|r| r.get_mut(c0)) {
                            origin.1 += 1;
                            col += span;
                            continue;
                        }
                    }
                }
                let mut el = Element::new(if row.is_header { "th" } else { "td" });
                if span > 1 {
                    el.set_attr("colspan", span.to_string());
                }
                self.flavor.decorate_cell(cell, &mut el);
                el.children = self.blocks(&cell.blocks);
                if cell.v_merge == Some(VMerge::Restart) {
                    merge_origins.insert(col, (ri, cells.len()));
                } else {
                    merge_origins.remove(&col);
                }
                cells.push((el, 1usize));
                col += span;
            }
            rows.push(cells);
        }

        let row_nodes: Vec<Node> = rows
            .into_iter()
            .map(|cells| {
                let mut tr = Element::new("tr");
                for (mut cell, rowspan) in cells {
                    if rowspan > 1 {
                        cell.set_attr("rowspan", rowspan.to_string());
                    }
                    tr.children.push(cell.into());
                }
                tr.into()
            })
            .collect();

        let mut table = Element::new(tag);
        set_classes(&mut table, &classes);
        self.flavor.decorate_table(t, &mut table);
        table.children = self.flavor.wrap_rows(row_nodes);
        Some(table)
    }
}

fn wrap(tag: &str, children: Vec<Node>) -> Vec<Node> {
    let mut el = Element::new(tag);
    el.children = children;
    vec![el.into()]
}

fn set_classes(el: &mut Element, classes: &[String]) {
    if classes.is_empty() {
        return;
    }
    let mut all: Vec<&str> = el.classes().collect();
    all.extend(classes.iter().map(String::as_str));
    let joined = all.join(" ");
    el.set_attr("class", joined);
}

/// Anything beyond blank text and bare line breaks.
fn has_content(nodes: &[Node]) -> bool {
    nodes.iter().any(|n| match n {
        Node::Text { text } => !text.trim().is_empty(),
        Node::Element(e) => !e.is("br") || has_content(&e.children),
    })
}

struct OpenList {
    el: Element,
    level: i32,
}

/// Folds flat numbered paragraphs into nested `ul`/`ol` trees. A change of
/// numbering instance starts a new list.
#[derive(Default)]
pub(crate) struct ListNester {
    num_id: Option<i32>,
    stack: Vec<OpenList>,
}

impl ListNester {
    pub fn push(&mut self, num_id: i32, level: i32, list: Element, li: Element, out: &mut Vec<Node>) {
        if self.num_id != Some(num_id) {
            self.finish(out);
            self.num_id = Some(num_id);
        }
        let level = level.max(0);
        while self.stack.last().is_some_and(|top| top.level > level) {
            let Some(done) = self.stack.pop() else {
                break;
            };
            if let Some(orphan) = self.attach(done) {
                let host = Element::new("li").with_child(orphan);
                self.stack.push(OpenList {
                    el: list.clone().with_child(host),
                    level,
                });
            }
        }
        if self.stack.last().map_or(true, |top| top.level < level) {
            self.stack.push(OpenList { el: list, level });
        }
        if let Some(top) = self.stack.last_mut() {
            top.el.children.push(li.into());
        }
    }

    /// Hangs a closed list off the last item of its parent. Returns it when
    /// there is no parent left.
    fn attach(&mut self, done: OpenList) -> Option<Element> {
        let Some(parent) = self.stack.last_mut() else {
            return Some(done.el);
        };
        match parent.el.children.last_mut() {
            Some(Node::Element(li)) => li.children.push(done.el.into()),
            _ => parent
                .el
                .children
                .push(Element::new("li").with_child(done.el).into()),
        }
        None
    }

    pub fn finish(&mut self, out: &mut Vec<Node>) {
        while let Some(done) = self.stack.pop() {
            if let Some(root) = self.attach(done) {
                out.push(root.into());
            }
        }
        self.num_id = None;
    }
}
