//! Layout-aware rendering: the same content as structural extraction, plus
//! page containers, per-run presentation and decoder bookkeeping attributes
//! that the sanitizer later strips.

use tracing::debug;

use crate::document::RawDocument;
use crate::docx::body::{
    DrawingImage, NumberingRef, PageGeometry, Paragraph, RunProps, Table, TableCell,
};
use crate::docx::rels::{content_type_from_extension, GENERIC_CONTENT_TYPE};
use crate::docx::MediaPart;
use crate::error::DecodeError;
use crate::markup::{Element, Node};

use super::emit::{Emitter, Flavor};
use super::{open_package, DecodeOptions, DecodeStrategy, Decoded};

const EMU_PER_PX: i64 = 9525;

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderedLayout;

struct Layout {
    inline_run_styles: bool,
    page: Option<PageGeometry>,
}

fn twips_to_pt(twips: i64) -> String {
    let pt = twips as f64 / 20.0;
    if pt.fract() == 0.0 {
        format!("{}pt", pt as i64)
    } else {
        format!("{pt:.1}pt")
    }
}

fn class_token(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

impl Flavor for Layout {
    /// Package file extension only; the content-types table is not consulted.
    fn image_content_type(&self, media: &MediaPart<'_>) -> String {
        content_type_from_extension(&media.part_name)
            .unwrap_or(GENERIC_CONTENT_TYPE)
            .to_string()
    }

    fn decorate_paragraph(&self, p: &Paragraph, el: &mut Element) {
        if let Some(id) = &p.style_id {
            let mut classes: Vec<String> = el.classes().map(str::to_string).collect();
            classes.push(format!("docx_{}", class_token(id)));
            el.set_attr("class", classes.join(" "));
        }
        let mut style = String::new();
        match p.alignment.as_deref() {
            Some("center") => style.push_str("text-align: center; "),
            Some("right") | Some("end") => style.push_str("text-align: right; "),
            Some("both") | Some("distribute") => style.push_str("text-align: justify; "),
            _ => {}
        }
        if let Some(indent) = p.indent_left_twips.filter(|v| *v != 0) {
            style.push_str(&format!("margin-left: {}; ", twips_to_pt(indent.into())));
        }
        if let Some(after) = p.spacing_after_twips {
            style.push_str(&format!("margin-bottom: {}; ", twips_to_pt(after.into())));
        }
        let style = style.trim_end();
        if !style.is_empty() {
            el.set_attr("style", style);
        }
    }

    fn decorate_run(&self, props: &RunProps, nodes: Vec<Node>) -> Vec<Node> {
        if !self.inline_run_styles {
            return nodes;
        }
        let mut style = Vec::new();
        if let Some(font) = &props.font {
            style.push(format!("font-family: '{font}';"));
        }
        if let Some(sz) = props.size_half_points {
            style.push(format!("font-size: {};", twips_to_pt(i64::from(sz) * 10)));
        }
        if let Some(color) = &props.color {
            style.push(format!("color: #{color};"));
        }
        if let Some(highlight) = &props.highlight {
            style.push(format!("background-color: {highlight};"));
        }
        if style.is_empty() {
            return nodes;
        }
        let mut span = Element::new("span").with_attr("style", style.join(" "));
        span.children = nodes;
        vec![span.into()]
    }

    fn decorate_list(&self, num: NumberingRef, el: &mut Element) {
        el.set_attr("class", format!("docx-num-{}-{}", num.num_id, num.ilvl));
    }

    fn decorate_table(&self, table: &Table, el: &mut Element) {
        if let Some(id) = &table.style_id {
            let mut classes: Vec<String> = el.classes().map(str::to_string).collect();
            classes.push(format!("docx_{}", class_token(id)));
            el.set_attr("class", classes.join(" "));
        }
    }

    fn decorate_cell(&self, cell: &TableCell, el: &mut Element) {
        if let Some(fill) = &cell.shading {
            el.set_attr("style", format!("background-color: #{fill};"));
        }
    }

    fn decorate_image(&self, img: &DrawingImage, el: &mut Element) {
        el.set_attr("data-docx-rel", img.rel_id.clone());
        if let Some((cx, cy)) = img.extent_emu {
            el.set_attr("width", (cx / EMU_PER_PX).to_string());
            el.set_attr("height", (cy / EMU_PER_PX).to_string());
        }
    }

    fn tab(&self) -> Node {
        Element::new("span")
            .with_attr("class", "docx-tab")
            .with_text("\t")
            .into()
    }

    fn bookmark(&self, name: &str) -> Option<Node> {
        Some(
            Element::new("span")
                .with_attr("id", name)
                .with_attr("class", "docx-bookmark")
                .into(),
        )
    }

    fn keep_empty_paragraphs(&self) -> bool {
        true
    }

    fn wrap_rows(&self, rows: Vec<Node>) -> Vec<Node> {
        let mut tbody = Element::new("tbody");
        tbody.children = rows;
        vec![tbody.into()]
    }

    fn wrap_document(&self, nodes: Vec<Node>) -> Vec<Node> {
        let mut article = Element::new("article");
        article.children = nodes;
        let mut section = Element::new("section")
            .with_attr("class", "docx")
            .with_child(article);
        if let Some(g) = self.page {
            section.set_attr(
                "style",
                format!(
                    "padding: {} {} {} {}; width: {}; min-height: {};",
                    twips_to_pt(g.margin_top.into()),
                    twips_to_pt(g.margin_right.into()),
                    twips_to_pt(g.margin_bottom.into()),
                    twips_to_pt(g.margin_left.into()),
                    twips_to_pt(g.width.into()),
                    twips_to_pt(g.height.into()),
                ),
            );
        }
        vec![Element::new("div")
            .with_attr("class", "docx-wrapper")
            .with_child(section)
            .into()]
    }
}

impl DecodeStrategy for RenderedLayout {
    fn name(&self) -> &'static str {
        "rendered"
    }

    fn decode(&self, raw: &RawDocument, options: &DecodeOptions) -> Result<Decoded, DecodeError> {
        let docx = open_package(raw)?;
        let layout = Layout {
            inline_run_styles: options.inline_run_styles,
            page: docx.page.filter(|_| options.page_geometry),
        };
        let decoded = Emitter::new(&docx, options, &layout).run();
        debug!(
            strategy = self.name(),
            messages = decoded.messages.len(),
            "rendered document"
        );
        Ok(decoded)
    }
}
