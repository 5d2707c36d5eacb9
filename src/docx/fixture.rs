//! In-memory `.docx` builder for tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const HYPERLINK_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

const DOC_NS: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture" "#,
    r#"xmlns:v="urn:schemas-microsoft-com:vml" "#,
    r#"xmlns:o="urn:schemas-microsoft-com:office:office""#
);

struct FixtureRel {
    id: String,
    rel_type: &'static str,
    target: String,
    external: bool,
}

pub(crate) struct DocxFixture {
    main_part: String,
    body: String,
    raw_document: Option<String>,
    include_document: bool,
    styles: Option<String>,
    numbering: Option<String>,
    rels: Vec<FixtureRel>,
    media: Vec<(String, Vec<u8>)>,
    defaults: Vec<(String, String)>,
}

impl DocxFixture {
    pub fn new() -> Self {
        Self {
            main_part: "word/document.xml".to_string(),
            body: String::new(),
            raw_document: None,
            include_document: true,
            styles: None,
            numbering: None,
            rels: Vec::new(),
            media: Vec::new(),
            defaults: vec![
                ("rels".into(), "application/vnd.openxmlformats-package.relationships+xml".into()),
                ("xml".into(), "application/xml".into()),
                ("png".into(), "image/png".into()),
                ("jpeg".into(), "image/jpeg".into()),
                ("gif".into(), "image/gif".into()),
            ],
        }
    }

    pub fn main_part(mut self, name: &str) -> Self {
        self.main_part = name.to_string();
        self
    }

    pub fn paragraph(mut self, inner: &str) -> Self {
        self.body.push_str("<w:p>");
        self.body.push_str(inner);
        self.body.push_str("</w:p>");
        self
    }

    pub fn block(mut self, xml: &str) -> Self {
        self.body.push_str(xml);
        self
    }

    pub fn styles(mut self, inner: &str) -> Self {
        self.styles = Some(inner.to_string());
        self
    }

    pub fn numbering(mut self, inner: &str) -> Self {
        self.numbering = Some(inner.to_string());
        self
    }

    /// Embeds `bytes` at `word/<target>` behind relationship `rel_id`.
    pub fn media(mut self, rel_id: &str, target: &str, bytes: Vec<u8>) -> Self {
        self.rels.push(FixtureRel {
            id: rel_id.to_string(),
            rel_type: IMAGE_REL,
            target: target.to_string(),
            external: false,
        });
        self.media.push((format!("word/{target}"), bytes));
        self
    }

    /// Image relationship whose target is not in the package.
    pub fn dangling_image(mut self, rel_id: &str, target: &str) -> Self {
        self.rels.push(FixtureRel {
            id: rel_id.to_string(),
            rel_type: IMAGE_REL,
            target: target.to_string(),
            external: false,
        });
        self
    }

    pub fn hyperlink(mut self, rel_id: &str, url: &str) -> Self {
        self.rels.push(FixtureRel {
            id: rel_id.to_string(),
            rel_type: HYPERLINK_REL,
            target: url.to_string(),
            external: true,
        });
        self
    }

    pub fn without_document(mut self) -> Self {
        self.include_document = false;
        self
    }

    pub fn raw_document(mut self, xml: &str) -> Self {
        self.raw_document = Some(xml.to_string());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut put = |name: &str, data: &[u8]| {
            zip.start_file(name, SimpleFileOptions::default())
                .expect("start fixture entry");
            zip.write_all(data).expect("write fixture entry");
        };

        let mut types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        for (ext, ct) in &self.defaults {
            types.push_str(&format!(r#"<Default Extension="{ext}" ContentType="{ct}"/>"#));
        }
        types.push_str(&format!(
            r#"<Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
            self.main_part
        ));
        put("[Content_Types].xml", types.as_bytes());

        put(
            "_rels/.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{}"/></Relationships>"#,
                self.main_part
            )
            .as_bytes(),
        );

        if self.include_document {
            let doc = match &self.raw_document {
                Some(raw) => raw.clone(),
                None => format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {DOC_NS}><w:body>{}<w:sectPr/></w:body></w:document>"#,
                    self.body
                ),
            };
            put(&self.main_part, doc.as_bytes());
        }

        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        if self.styles.is_some() {
            rels.push_str(r#"<Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#);
        }
        if self.numbering.is_some() {
            rels.push_str(r#"<Relationship Id="rIdNumbering" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>"#);
        }
        for rel in &self.rels {
            let mode = if rel.external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            rels.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{mode}/>"#,
                rel.id,
                rel.rel_type,
                rel.target.replace('&', "&amp;")
            ));
        }
        rels.push_str("</Relationships>");
        let rels_name = crate::docx::package::rels_part_name(&self.main_part);
        put(&rels_name, rels.as_bytes());

        if let Some(styles) = &self.styles {
            put(
                "word/styles.xml",
                format!(r#"<w:styles {DOC_NS}>{styles}</w:styles>"#).as_bytes(),
            );
        }
        if let Some(numbering) = &self.numbering {
            put(
                "word/numbering.xml",
                format!(r#"<w:numbering {DOC_NS}>{numbering}</w:numbering>"#).as_bytes(),
            );
        }
        for (name, data) in &self.media {
            put(name, data);
        }

        zip.finish().expect("finish fixture zip").into_inner()
    }
}

/// `<w:r>` holding an inline drawing that points at `rel_id`.
pub(crate) fn drawing_run(rel_id: &str, descr: &str) -> String {
    format!(
        r#"<w:r><w:drawing><wp:inline><wp:extent cx="952500" cy="952500"/><wp:docPr id="1" name="Picture" descr="{descr}"/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:blipFill><a:blip r:embed="{rel_id}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
    )
}

/// Minimal PNG signature followed by filler bytes.
pub(crate) fn png_bytes() -> Vec<u8> {
    let mut v = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    v.extend_from_slice(&[0u8; 24]);
    v
}
