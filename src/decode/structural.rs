//! Semantic extraction: headings, paragraphs, lists, tables and inline
//! images, with styling reduced to tags and style-map classes.

use tracing::debug;

use crate::document::RawDocument;
use crate::docx::body::Paragraph;
use crate::docx::rels::GENERIC_CONTENT_TYPE;
use crate::docx::MediaPart;
use crate::error::DecodeError;
use crate::markup::Element;

use super::emit::{Emitter, Flavor};
use super::{open_package, DecodeOptions, DecodeStrategy, Decoded};

#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralExtraction;

struct Semantic;

impl Flavor for Semantic {
    /// Declared type from `[Content_Types].xml`, generic when undeclared.
    fn image_content_type(&self, media: &MediaPart<'_>) -> String {
        media
            .declared_type
            .unwrap_or(GENERIC_CONTENT_TYPE)
            .to_string()
    }

    fn decorate_paragraph(&self, p: &Paragraph, el: &mut Element) {
        let align = match p.alignment.as_deref() {
            Some("center") => "center",
            Some("right") | Some("end") => "right",
            Some("both") | Some("distribute") => "justify",
            _ => return,
        };
        el.set_attr("style", format!("text-align: {align};"));
    }
}

impl DecodeStrategy for StructuralExtraction {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn decode(&self, raw: &RawDocument, options: &DecodeOptions) -> Result<Decoded, DecodeError> {
        let docx = open_package(raw)?;
        let decoded = Emitter::new(&docx, options, &Semantic).run();
        debug!(
            strategy = self.name(),
            nodes = decoded.markup.nodes().len(),
            messages = decoded.messages.len(),
            "decoded document"
        );
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::decode::image::{EmbeddedImage, ImageConversion};
    use crate::decode::style_map::StyleMap;
    use crate::decode::PageBreakPolicy;
    use crate::document::DocumentKind;
    use crate::docx::fixture::{drawing_run, png_bytes, DocxFixture};

    const STYLES: &str = r#"
        <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
        <w:style w:type="paragraph" w:styleId="BodyText"><w:name w:val="Body Text"/></w:style>
        <w:style w:type="paragraph" w:styleId="Outline"><w:name w:val="My Outline"/><w:pPr><w:outlineLvl w:val="2"/></w:pPr></w:style>
        <w:style w:type="character" w:styleId="Strong"><w:name w:val="Strong"/></w:style>
        <w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/></w:style>"#;

    const NUMBERING: &str = r#"
        <w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
        <w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#;

    fn decode_with(bytes: Vec<u8>, options: &DecodeOptions) -> Decoded {
        let raw = RawDocument::new(DocumentKind::Docx, bytes);
        StructuralExtraction.decode(&raw, options).unwrap()
    }

    fn decode(bytes: Vec<u8>) -> Decoded {
        decode_with(bytes, &DecodeOptions::default())
    }

    fn styled(style: &str, text: &str) -> String {
        format!(r#"<w:pPr><w:pStyle w:val="{style}"/></w:pPr><w:r><w:t>{text}</w:t></w:r>"#)
    }

    #[test]
    fn headings_paragraphs_and_inline_formatting() {
        let bytes = DocxFixture::new()
            .styles(STYLES)
            .paragraph(&styled("Heading1", "Report"))
            .paragraph(&styled("Outline", "Section"))
            .paragraph(
                r#"<w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:i/></w:rPr><w:t>Key</w:t></w:r><w:r><w:rPr><w:vertAlign w:val="superscript"/></w:rPr><w:t>2</w:t></w:r><w:r><w:rPr><w:rStyle w:val="Strong"/></w:rPr><w:t xml:space="preserve"> a&amp;b</w:t></w:r>"#,
            )
            .build();
        let out = decode(bytes);
        assert_eq!(
            out.markup.to_html(),
            concat!(
                "<h1>Report</h1><h3>Section</h3>",
                r#"<p style="text-align: center;"><strong><em>Key</em></strong><sup>2</sup><strong> a&amp;b</strong></p>"#
            )
        );
        assert!(out.messages.is_empty());
    }

    #[test]
    fn unmapped_style_warns_once_and_falls_back_to_p() {
        let bytes = DocxFixture::new()
            .styles(STYLES)
            .paragraph(&styled("BodyText", "one"))
            .paragraph(&styled("BodyText", "two"))
            .build();
        let out = decode(bytes);
        assert_eq!(out.markup.to_html(), "<p>one</p><p>two</p>");
        assert_eq!(out.messages.len(), 1);
        assert!(out.has_warnings());
        assert!(out.messages[0].message.contains("'Body Text'"));
    }

    #[test]
    fn numbered_paragraphs_become_nested_lists() {
        let item = |lvl: u8, text: &str| {
            format!(
                r#"<w:pPr><w:numPr><w:ilvl w:val="{lvl}"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r>"#
            )
        };
        let bytes = DocxFixture::new()
            .numbering(NUMBERING)
            .paragraph(&item(0, "one"))
            .paragraph(&item(1, "bullet"))
            .paragraph(&item(0, "two"))
            .paragraph(r#"<w:r><w:t>after</w:t></w:r>"#)
            .build();
        assert_eq!(
            decode(bytes).markup.to_html(),
            "<ol><li>one<ul><li>bullet</li></ul></li><li>two</li></ol><p>after</p>"
        );
    }

    #[test]
    fn tables_with_header_colspan_and_rowspan() {
        let cell = |pr: &str, text: &str| {
            format!(r#"<w:tc><w:tcPr>{pr}</w:tcPr><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:tc>"#)
        };
        let table = format!(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/></w:tblPr><w:tr><w:trPr><w:tblHeader/></w:trPr>{}</w:tr><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>"#,
            cell(r#"<w:gridSpan w:val="2"/>"#, "Head"),
            cell(r#"<w:vMerge w:val="restart"/>"#, "Tall"),
            cell("", "b"),
            cell("<w:vMerge/>", ""),
            cell("", "c"),
        );
        let bytes = DocxFixture::new().styles(STYLES).block(&table).build();
        let out = decode(bytes);
        assert_eq!(
            out.markup.to_html(),
            concat!(
                r#"<table class="imported-table">"#,
                r#"<tr><th colspan="2"><p>Head</p></th></tr>"#,
                r#"<tr><td rowspan="2"><p>Tall</p></td><td><p>b</p></td></tr>"#,
                r#"<tr><td><p>c</p></td></tr></table>"#
            )
        );
        assert!(out.messages.is_empty());
    }

    #[test]
    fn images_use_declared_type_and_missing_media_becomes_placeholder() {
        let bytes = DocxFixture::new()
            .media("rId5", "media/image1.png", png_bytes())
            .media("rId6", "media/blob.bin", png_bytes())
            .dangling_image("rId7", "media/gone.png")
            .paragraph(&drawing_run("rId5", "Logo"))
            .paragraph(&drawing_run("rId6", ""))
            .paragraph(&drawing_run("rId7", "Chart"))
            .build();
        let out = decode(bytes);
        let html = out.markup.to_html();
        assert!(html.contains(r#"<img src="data:image/png;base64,iVBORw0KGgo"#));
        assert!(html.contains(r#"alt="Logo""#));
        assert!(html.contains(r#"src="data:application/octet-stream;base64,iVBORw0KGgo"#));
        assert!(html.contains(r#"alt="Imported image from Word document""#));
        assert!(html.contains(r#"<span class="import-placeholder">[Image: Chart]</span>"#));
        assert_eq!(out.messages.len(), 1);
    }

    #[test]
    fn custom_image_handler_failure_is_a_warning() {
        let options = DecodeOptions {
            image_handler: Arc::new(|_: &EmbeddedImage<'_>| ImageConversion::Failed("nope".into())),
            ..DecodeOptions::default()
        };
        let bytes = DocxFixture::new()
            .media("rId5", "media/image1.png", png_bytes())
            .paragraph(&drawing_run("rId5", ""))
            .build();
        let out = decode_with(bytes, &options);
        assert_eq!(
            out.markup.to_html(),
            r#"<p><span class="import-placeholder">[Image could not be imported]</span></p>"#
        );
        assert!(out.messages[0].message.contains("nope"));
    }

    #[test]
    fn page_break_policies_and_links() {
        let body = |b: DocxFixture| {
            b.hyperlink("rId3", "https://example.com/?a=1&b=2")
                .paragraph(r#"<w:hyperlink r:id="rId3"><w:r><w:t>site</w:t></w:r></w:hyperlink><w:r><w:br w:type="page"/></w:r>"#)
                .paragraph(r#"<w:hyperlink w:anchor="top"><w:r><w:t>up</w:t></w:r></w:hyperlink>"#)
                .build()
        };
        let out = decode(body(DocxFixture::new()));
        assert_eq!(
            out.markup.to_html(),
            r##"<p><a href="https://example.com/?a=1&amp;b=2">site</a></p><hr /><p><a href="#top">up</a></p>"##
        );

        let marker = DecodeOptions {
            page_breaks: PageBreakPolicy::Marker,
            ..DecodeOptions::default()
        };
        let html = decode_with(body(DocxFixture::new()), &marker).markup.to_html();
        assert!(html.contains(r#"<div class="page-break">Page Break</div>"#));

        let ignore = DecodeOptions {
            page_breaks: PageBreakPolicy::Ignore,
            ..DecodeOptions::default()
        };
        let html = decode_with(body(DocxFixture::new()), &ignore).markup.to_html();
        assert!(!html.contains("<hr"));
    }

    #[test]
    fn style_map_rules_can_drop_and_restyle() {
        let map = StyleMap::with_defaults(
            &[
                "p[style-name='Body Text'] => !".to_string(),
                "p[style-name='heading 1'] => h2.lead".to_string(),
            ],
            true,
        )
        .unwrap();
        let options = DecodeOptions {
            style_map: map,
            ..DecodeOptions::default()
        };
        let bytes = DocxFixture::new()
            .styles(STYLES)
            .paragraph(&styled("Heading1", "Top"))
            .paragraph(&styled("BodyText", "hidden"))
            .build();
        let out = decode_with(bytes, &options);
        assert_eq!(out.markup.to_html(), r#"<h2 class="lead">Top</h2>"#);
        assert!(out.messages.is_empty());
    }
}
