pub mod body;
pub mod numbering;
pub mod package;
pub mod rels;
pub mod styles;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixture;

use std::fmt;

use tracing::debug;

use crate::error::DecodeError;

use body::{parse_body, parse_page_geometry, BodyBlock, PageGeometry};
use numbering::Numbering;
use package::DocxPackage;
use rels::{part_dir, resolve_target, ContentTypes, Relationships};
use styles::Styles;
use xml::parse_xml_tree;

const STYLES_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const NUMBERING_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";

/// A parsed package: body model plus the lookup tables the emitters need.
pub struct OpenedDocx {
    pub main_part: String,
    pub body: Vec<BodyBlock>,
    pub page: Option<PageGeometry>,
    pub styles: Styles,
    pub numbering: Numbering,
    pub rels: Relationships,
    pub content_types: ContentTypes,
    package: DocxPackage,
}

pub struct MediaPart<'a> {
    pub part_name: String,
    pub bytes: &'a [u8],
    pub declared_type: Option<&'a str>,
}

#[derive(Debug)]
pub enum MediaError {
    UnknownRelationship(String),
    External(String),
    MissingPart(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::UnknownRelationship(id) => write!(f, "image relationship {id} not found"),
            MediaError::External(target) => write!(f, "linked image {target} is not embedded"),
            MediaError::MissingPart(part) => write!(f, "image part {part} missing from package"),
        }
    }
}

fn malformed(part: &str, e: anyhow::Error) -> DecodeError {
    DecodeError::MalformedPart {
        part: part.to_string(),
        reason: format!("{e:#}"),
    }
}

impl OpenedDocx {
    pub fn open(bytes: &[u8]) -> Result<Self, DecodeError> {
        let package = DocxPackage::from_bytes(bytes)?;
        let main_part = package.main_document_part()?;
        let rels = package.relationships_for(&main_part)?;
        let content_types = match package.part(ContentTypes::PART_NAME) {
            Some(data) => ContentTypes::parse(data)?,
            None => ContentTypes::default(),
        };

        let dir = part_dir(&main_part).to_string();
        let side_part = |rel_type: &str, fallback: &str| -> String {
            rels.by_type(rel_type)
                .filter(|r| !r.external)
                .map(|r| resolve_target(&dir, &r.target))
                .unwrap_or_else(|| fallback.to_string())
        };
        let styles_part = side_part(STYLES_REL, "word/styles.xml");
        let numbering_part = side_part(NUMBERING_REL, "word/numbering.xml");

        let styles = match package.part(&styles_part) {
            Some(data) => Styles::parse(&styles_part, data)?,
            None => Styles::default(),
        };
        let numbering = match package.part(&numbering_part) {
            Some(data) => Numbering::parse(&numbering_part, data)?,
            None => Numbering::default(),
        };

        let document_xml = package.require_part(&main_part)?;
        let root = parse_xml_tree(&main_part, document_xml).map_err(|e| malformed(&main_part, e))?;
        if root.local() != "document" {
            return Err(DecodeError::MalformedPart {
                part: main_part,
                reason: format!("unexpected root element {}", root.name),
            });
        }
        let body = parse_body(&root);
        let page = parse_page_geometry(&root);
        debug!(part = %main_part, blocks = body.len(), "parsed document body");

        Ok(Self {
            main_part,
            body,
            page,
            styles,
            numbering,
            rels,
            content_types,
            package,
        })
    }

    /// Bytes and declared type of an embedded image referenced from the body.
    pub fn media(&self, rel_id: &str) -> Result<MediaPart<'_>, MediaError> {
        let rel = self
            .rels
            .get(rel_id)
            .ok_or_else(|| MediaError::UnknownRelationship(rel_id.to_string()))?;
        if rel.external {
            return Err(MediaError::External(rel.target.clone()));
        }
        let part_name = resolve_target(part_dir(&self.main_part), &rel.target);
        let bytes = self
            .package
            .part(&part_name)
            .ok_or_else(|| MediaError::MissingPart(part_name.clone()))?;
        let declared_type = self.content_types.declared(&part_name);
        Ok(MediaPart {
            part_name,
            bytes,
            declared_type,
        })
    }

    pub fn hyperlink_target(&self, rel_id: &str) -> Option<&str> {
        self.rels.get(rel_id).map(|r| r.target.as_str())
    }
}
