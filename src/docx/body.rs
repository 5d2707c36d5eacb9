//! Logical model of `document.xml`: just enough structure for markup emission.

use super::xml::XmlElement;

#[derive(Clone, Debug)]
pub enum BodyBlock {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumberingRef {
    pub num_id: i32,
    pub ilvl: i32,
}

#[derive(Clone, Debug, Default)]
pub struct Paragraph {
    pub style_id: Option<String>,
    pub numbering: Option<NumberingRef>,
    pub outline_lvl: Option<u32>,
    pub alignment: Option<String>,
    pub indent_left_twips: Option<i32>,
    pub spacing_after_twips: Option<i32>,
    pub page_break_before: bool,
    pub bookmarks: Vec<String>,
    pub content: Vec<Inline>,
}

impl Paragraph {
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.content.iter().flat_map(|i| match i {
            Inline::Run(r) => std::slice::from_ref(r).iter(),
            Inline::Hyperlink(h) => h.runs.iter(),
        })
    }

    pub fn has_page_break(&self) -> bool {
        self.runs()
            .any(|r| r.content.iter().any(|c| matches!(c, RunContent::PageBreak)))
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for r in self.runs() {
            for c in &r.content {
                if let RunContent::Text(t) = c {
                    out.push_str(t);
                }
            }
        }
        out
    }
}

#[derive(Clone, Debug)]
pub enum Inline {
    Run(Run),
    Hyperlink(Hyperlink),
}

#[derive(Clone, Debug, Default)]
pub struct Hyperlink {
    pub rel_id: Option<String>,
    pub anchor: Option<String>,
    pub runs: Vec<Run>,
}

#[derive(Clone, Debug, Default)]
pub struct Run {
    pub props: RunProps,
    pub content: Vec<RunContent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertAlign {
    Superscript,
    Subscript,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunProps {
    pub style_id: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub vert_align: Option<VertAlign>,
    pub size_half_points: Option<u32>,
    pub color: Option<String>,
    pub font: Option<String>,
    pub highlight: Option<String>,
}

#[derive(Clone, Debug)]
pub enum RunContent {
    Text(String),
    Tab,
    LineBreak,
    PageBreak,
    Image(DrawingImage),
}

#[derive(Clone, Debug)]
pub struct DrawingImage {
    pub rel_id: String,
    pub alt: Option<String>,
    pub extent_emu: Option<(i64, i64)>,
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub style_id: Option<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug, Default)]
pub struct TableRow {
    pub is_header: bool,
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VMerge {
    Restart,
    Continue,
}

#[derive(Clone, Debug)]
pub struct TableCell {
    pub grid_span: u32,
    pub v_merge: Option<VMerge>,
    pub shading: Option<String>,
    pub blocks: Vec<BodyBlock>,
}

/// Final `w:sectPr` page size and margins, in twips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub margin_top: u32,
    pub margin_right: u32,
    pub margin_bottom: u32,
    pub margin_left: u32,
}

pub fn parse_page_geometry(document: &XmlElement) -> Option<PageGeometry> {
    let sect = document.child("w:body")?.child("w:sectPr")?;
    let size = sect.child("w:pgSz")?;
    let num = |el: Option<&XmlElement>, key: &str, default: u32| {
        el.and_then(|e| e.attr(key))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    };
    let margins = sect.child("w:pgMar");
    Some(PageGeometry {
        width: num(Some(size), "w:w", 12240),
        height: num(Some(size), "w:h", 15840),
        margin_top: num(margins, "w:top", 1440),
        margin_right: num(margins, "w:right", 1440),
        margin_bottom: num(margins, "w:bottom", 1440),
        margin_left: num(margins, "w:left", 1440),
    })
}

/// Blocks of `w:body`, or an empty list when the part has no body.
pub fn parse_body(document: &XmlElement) -> Vec<BodyBlock> {
    let mut out = Vec::new();
    if let Some(body) = document.child("w:body") {
        parse_blocks(body, &mut out);
    }
    out
}

fn parse_blocks(container: &XmlElement, out: &mut Vec<BodyBlock>) {
    for el in container.elements() {
        match el.name.as_str() {
            "w:p" => out.push(BodyBlock::Paragraph(parse_paragraph(el))),
            "w:tbl" => out.push(BodyBlock::Table(parse_table(el))),
            "w:sdt" => {
                if let Some(content) = el.child("w:sdtContent") {
                    parse_blocks(content, out);
                }
            }
            "w:customXml" | "w:ins" => parse_blocks(el, out),
            "mc:AlternateContent" => {
                if let Some(choice) = el.child("mc:Choice") {
                    parse_blocks(choice, out);
                }
            }
            _ => {}
        }
    }
}

fn parse_paragraph(p: &XmlElement) -> Paragraph {
    let mut para = Paragraph::default();
    if let Some(ppr) = p.child("w:pPr") {
        para.style_id = ppr.child_val("w:pStyle").map(|s| s.trim().to_string());
        if let Some(num_pr) = ppr.child("w:numPr") {
            let num_id = num_pr.child_val("w:numId").and_then(|v| v.trim().parse().ok());
            let ilvl = num_pr
                .child_val("w:ilvl")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            // numId 0 explicitly removes numbering inherited from the style.
            if let Some(num_id) = num_id.filter(|n: &i32| *n > 0) {
                para.numbering = Some(NumberingRef { num_id, ilvl });
            }
        }
        para.outline_lvl = ppr
            .child_val("w:outlineLvl")
            .and_then(|v| v.trim().parse().ok());
        para.alignment = ppr.child_val("w:jc").map(|s| s.to_string());
        para.indent_left_twips = ppr
            .child("w:ind")
            .and_then(|i| i.attr("w:left").or_else(|| i.attr("w:start")))
            .and_then(|v| v.trim().parse().ok());
        para.spacing_after_twips = ppr
            .child("w:spacing")
            .and_then(|s| s.attr("w:after"))
            .and_then(|v| v.trim().parse().ok());
        para.page_break_before = ppr.toggle("w:pageBreakBefore").unwrap_or(false);
    }
    collect_inlines(p, &mut para.content, &mut para.bookmarks);
    para
}

fn collect_inlines(container: &XmlElement, out: &mut Vec<Inline>, bookmarks: &mut Vec<String>) {
    for el in container.elements() {
        match el.name.as_str() {
            "w:r" => out.push(Inline::Run(parse_run(el))),
            "w:hyperlink" => {
                let mut inner = Vec::new();
                collect_inlines(el, &mut inner, bookmarks);
                let runs = inner
                    .into_iter()
                    .flat_map(|i| match i {
                        Inline::Run(r) => vec![r],
                        Inline::Hyperlink(h) => h.runs,
                    })
                    .collect();
                out.push(Inline::Hyperlink(Hyperlink {
                    rel_id: el.attr("r:id").map(|s| s.to_string()),
                    anchor: el.attr("w:anchor").map(|s| s.to_string()),
                    runs,
                }));
            }
            "w:bookmarkStart" => {
                if let Some(name) = el.attr("w:name").filter(|n| !n.starts_with('_')) {
                    bookmarks.push(name.to_string());
                }
            }
            "w:ins" | "w:smartTag" | "w:customXml" | "w:fldSimple" | "w:dir" | "w:bdo" => {
                collect_inlines(el, out, bookmarks)
            }
            "w:sdt" => {
                if let Some(content) = el.child("w:sdtContent") {
                    collect_inlines(content, out, bookmarks);
                }
            }
            "mc:AlternateContent" => {
                if let Some(choice) = el.child("mc:Choice") {
                    collect_inlines(choice, out, bookmarks);
                }
            }
            _ => {}
        }
    }
}

fn parse_run_props(rpr: &XmlElement) -> RunProps {
    RunProps {
        style_id: rpr.child_val("w:rStyle").map(|s| s.trim().to_string()),
        bold: rpr.toggle("w:b").unwrap_or(false),
        italic: rpr.toggle("w:i").unwrap_or(false),
        underline: rpr
            .child_val("w:u")
            .map(|v| v != "none")
            .or_else(|| rpr.child("w:u").map(|_| true))
            .unwrap_or(false),
        strike: rpr.toggle("w:strike").unwrap_or(false) || rpr.toggle("w:dstrike").unwrap_or(false),
        vert_align: match rpr.child_val("w:vertAlign") {
            Some("superscript") => Some(VertAlign::Superscript),
            Some("subscript") => Some(VertAlign::Subscript),
            _ => None,
        },
        size_half_points: rpr.child_val("w:sz").and_then(|v| v.trim().parse().ok()),
        color: rpr
            .child_val("w:color")
            .filter(|c| *c != "auto")
            .map(|s| s.to_string()),
        font: rpr
            .child("w:rFonts")
            .and_then(|f| f.attr("w:ascii").or_else(|| f.attr("w:hAnsi")))
            .map(|s| s.to_string()),
        highlight: rpr
            .child_val("w:highlight")
            .filter(|h| *h != "none")
            .map(|s| s.to_string()),
    }
}

fn parse_run(r: &XmlElement) -> Run {
    let mut run = Run {
        props: r.child("w:rPr").map(parse_run_props).unwrap_or_default(),
        content: Vec::new(),
    };
    collect_run_content(r, &mut run.content);
    run
}

fn collect_run_content(container: &XmlElement, out: &mut Vec<RunContent>) {
    for el in container.elements() {
        match el.name.as_str() {
            "w:t" => out.push(RunContent::Text(el.text())),
            "w:tab" | "w:ptab" => out.push(RunContent::Tab),
            "w:cr" => out.push(RunContent::LineBreak),
            "w:br" => match el.attr("w:type") {
                Some("page") => out.push(RunContent::PageBreak),
                _ => out.push(RunContent::LineBreak),
            },
            "w:noBreakHyphen" => out.push(RunContent::Text("-".to_string())),
            "w:softHyphen" => out.push(RunContent::Text("\u{ad}".to_string())),
            "w:sym" => {
                let ch = el
                    .attr("w:char")
                    .and_then(|c| u32::from_str_radix(c, 16).ok())
                    .and_then(char::from_u32);
                if let Some(ch) = ch {
                    out.push(RunContent::Text(ch.to_string()));
                }
            }
            "w:drawing" => {
                if let Some(img) = drawing_image(el) {
                    out.push(RunContent::Image(img));
                }
            }
            "w:pict" | "w:object" => {
                if let Some(img) = vml_image(el) {
                    out.push(RunContent::Image(img));
                }
            }
            "mc:AlternateContent" => {
                if let Some(choice) = el.child("mc:Choice") {
                    collect_run_content(choice, out);
                }
            }
            _ => {}
        }
    }
}

fn drawing_image(drawing: &XmlElement) -> Option<DrawingImage> {
    let blip = drawing.find_descendant("a:blip")?;
    let rel_id = blip.attr("r:embed").or_else(|| blip.attr("r:link"))?;
    let doc_pr = drawing.find_descendant("wp:docPr");
    let alt = doc_pr
        .and_then(|d| d.attr("descr").or_else(|| d.attr("title")))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let extent_emu = drawing.find_descendant("wp:extent").and_then(|e| {
        let cx = e.attr("cx")?.parse().ok()?;
        let cy = e.attr("cy")?.parse().ok()?;
        Some((cx, cy))
    });
    Some(DrawingImage {
        rel_id: rel_id.to_string(),
        alt,
        extent_emu,
    })
}

fn vml_image(pict: &XmlElement) -> Option<DrawingImage> {
    let data = pict.find_descendant("v:imagedata")?;
    let rel_id = data.attr("r:id")?;
    Some(DrawingImage {
        rel_id: rel_id.to_string(),
        alt: data
            .attr("o:title")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        extent_emu: None,
    })
}

fn parse_table(tbl: &XmlElement) -> Table {
    let mut table = Table {
        style_id: tbl
            .child("w:tblPr")
            .and_then(|p| p.child_val("w:tblStyle"))
            .map(|s| s.to_string()),
        rows: Vec::new(),
    };
    for tr in tbl.children_named("w:tr") {
        let is_header = tr
            .child("w:trPr")
            .and_then(|p| p.toggle("w:tblHeader"))
            .unwrap_or(false);
        let mut row = TableRow {
            is_header,
            cells: Vec::new(),
        };
        for tc in tr.children_named("w:tc") {
            let tc_pr = tc.child("w:tcPr");
            let grid_span = tc_pr
                .and_then(|p| p.child_val("w:gridSpan"))
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(1);
            let v_merge = tc_pr.and_then(|p| p.child("w:vMerge")).map(|m| {
                match m.attr("w:val") {
                    Some("restart") => VMerge::Restart,
                    _ => VMerge::Continue,
                }
            });
            let shading = tc_pr
                .and_then(|p| p.child("w:shd"))
                .and_then(|s| s.attr("w:fill"))
                .filter(|f| *f != "auto")
                .map(|s| s.to_string());
            let mut blocks = Vec::new();
            parse_blocks(tc, &mut blocks);
            row.cells.push(TableCell {
                grid_span,
                v_merge,
                shading,
                blocks,
            });
        }
        table.rows.push(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_tree;

    fn body(inner: &str) -> Vec<BodyBlock> {
        let xml = format!(
            r#"<w:document xmlns:w="urn:w" xmlns:r="urn:r" xmlns:a="urn:a" xmlns:wp="urn:wp"><w:body>{inner}</w:body></w:document>"#
        );
        parse_body(&parse_xml_tree("word/document.xml", xml.as_bytes()).unwrap())
    }

    #[test]
    fn paragraph_properties_and_runs() {
        let blocks = body(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/><w:jc w:val="center"/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="4"/></w:numPr></w:pPr>
               <w:r><w:rPr><w:b/><w:i w:val="false"/></w:rPr><w:t>Bold</w:t><w:tab/><w:t>x</w:t></w:r>
               <w:ins><w:r><w:t>+ins</w:t></w:r></w:ins>
               <w:del><w:r><w:delText>gone</w:delText></w:r></w:del></w:p>"#,
        );
        let BodyBlock::Paragraph(p) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.style_id.as_deref(), Some("Heading2"));
        assert_eq!(p.alignment.as_deref(), Some("center"));
        assert_eq!(p.numbering, Some(NumberingRef { num_id: 4, ilvl: 1 }));
        assert_eq!(p.text(), "Boldx+ins");
        let first = p.runs().next().unwrap();
        assert!(first.props.bold);
        assert!(!first.props.italic);
    }

    #[test]
    fn drawings_hyperlinks_and_page_breaks() {
        let blocks = body(
            r#"<w:p><w:hyperlink r:id="rId9"><w:r><w:t>link</w:t></w:r></w:hyperlink>
               <w:r><w:drawing><wp:inline><wp:extent cx="914400" cy="457200"/><wp:docPr id="1" name="Picture 1" descr="A chart"/>
               <a:graphic><a:graphicData><a:blip r:embed="rId5"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>
               <w:r><w:br w:type="page"/></w:r></w:p>"#,
        );
        let BodyBlock::Paragraph(p) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(p.has_page_break());
        assert!(matches!(&p.content[0], Inline::Hyperlink(h) if h.rel_id.as_deref() == Some("rId9")));
        let img = p
            .runs()
            .flat_map(|r| r.content.iter())
            .find_map(|c| match c {
                RunContent::Image(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(img.rel_id, "rId5");
        assert_eq!(img.alt.as_deref(), Some("A chart"));
        assert_eq!(img.extent_emu, Some((914400, 457200)));
    }

    #[test]
    fn tables_with_spans_and_headers() {
        let blocks = body(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="Grid"/></w:tblPr>
               <w:tr><w:trPr><w:tblHeader/></w:trPr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p><w:r><w:t>h</w:t></w:r></w:p></w:tc></w:tr>
               <w:tr><w:tc><w:tcPr><w:vMerge w:val="restart"/></w:tcPr><w:p/></w:tc><w:tc><w:p/></w:tc></w:tr>
               <w:tr><w:tc><w:tcPr><w:vMerge/></w:tcPr><w:p/></w:tc><w:tc><w:p/></w:tc></w:tr></w:tbl>"#,
        );
        let BodyBlock::Table(t) = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(t.style_id.as_deref(), Some("Grid"));
        assert!(t.rows[0].is_header);
        assert_eq!(t.rows[0].cells[0].grid_span, 2);
        assert_eq!(t.rows[1].cells[0].v_merge, Some(VMerge::Restart));
        assert_eq!(t.rows[2].cells[0].v_merge, Some(VMerge::Continue));
    }

    #[test]
    fn content_controls_are_transparent() {
        let blocks = body(
            r#"<w:sdt><w:sdtContent><w:p><w:r><w:t>inside</w:t></w:r></w:p></w:sdtContent></w:sdt><w:sectPr/>"#,
        );
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn section_geometry_with_default_margins() {
        let xml = r#"<w:document xmlns:w="urn:w"><w:body><w:p/><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#;
        let root = parse_xml_tree("word/document.xml", xml.as_bytes()).unwrap();
        let g = parse_page_geometry(&root).unwrap();
        assert_eq!((g.width, g.height), (11906, 16838));
        assert_eq!(g.margin_left, 1440);
    }
}
