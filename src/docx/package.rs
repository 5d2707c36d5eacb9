use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::DecodeError;

use super::rels::{resolve_target, Relationships};

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
/// Upper bound for one uncompressed part.
const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;
/// The declared size is only a hint; corrupt headers may claim anything.
const PREALLOC_LIMIT: u64 = 4 * 1024 * 1024;

fn read_part(name: &str, reader: impl Read, declared: u64, limit: u64) -> Result<Vec<u8>, DecodeError> {
    let malformed = |reason: String| DecodeError::MalformedPart {
        part: name.to_string(),
        reason,
    };
    let mut data = Vec::with_capacity(declared.min(PREALLOC_LIMIT).min(limit) as usize);
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| malformed(e.to_string()))?;
    if data.len() as u64 > limit {
        return Err(malformed(format!("part exceeds {limit} bytes")));
    }
    Ok(data)
}

/// Unpacked OOXML package held in memory.
pub struct DocxPackage {
    entries: HashMap<String, Vec<u8>>,
}

impl DocxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.starts_with(&OLE_MAGIC) {
            return Err(DecodeError::LegacyBinary);
        }
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DecodeError::NotAPackage(e.to_string()))?;
        let mut entries = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| DecodeError::NotAPackage(format!("zip entry {i}: {e}")))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let declared = file.size();
            let data = read_part(&name, &mut file, declared, MAX_PART_BYTES)?;
            entries.insert(name, data);
        }
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.trim_start_matches('/');
        if let Some(data) = self.entries.get(name) {
            return Some(data);
        }
        // Zip names are case-sensitive but Word itself is not.
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn require_part(&self, name: &str) -> Result<&[u8], DecodeError> {
        self.part(name)
            .ok_or_else(|| DecodeError::MissingPart(name.to_string()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Main document part, found through the package relationships.
    pub fn main_document_part(&self) -> Result<String, DecodeError> {
        if let Some(data) = self.part("_rels/.rels") {
            let rels = Relationships::parse("_rels/.rels", data)?;
            if let Some(rel) = rels.by_type(OFFICE_DOCUMENT_REL) {
                let target = resolve_target("", &rel.target);
                if self.part(&target).is_some() {
                    return Ok(target);
                }
            }
        }
        if self.part(DEFAULT_MAIN_PART).is_some() {
            return Ok(DEFAULT_MAIN_PART.to_string());
        }
        Err(DecodeError::MissingPart(DEFAULT_MAIN_PART.to_string()))
    }

    /// Relationships of `part`, empty when the part has none.
    pub fn relationships_for(&self, part: &str) -> Result<Relationships, DecodeError> {
        let rels_name = rels_part_name(part);
        match self.part(&rels_name) {
            Some(data) => Relationships::parse(&rels_name, data),
            None => Ok(Relationships::default()),
        }
    }
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixture::DocxFixture;

    #[test]
    fn rejects_ole_compound_files() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(matches!(
            DocxPackage::from_bytes(&bytes),
            Err(DecodeError::LegacyBinary)
        ));
    }

    #[test]
    fn rejects_non_zip_payloads() {
        assert!(matches!(
            DocxPackage::from_bytes(b"definitely not a zip"),
            Err(DecodeError::NotAPackage(_))
        ));
    }

    #[test]
    fn finds_main_part_through_package_rels() {
        let bytes = DocxFixture::new()
            .main_part("word/document2.xml")
            .paragraph("<w:r><w:t>x</w:t></w:r>")
            .build();
        let pkg = DocxPackage::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.main_document_part().unwrap(), "word/document2.xml");
    }

    #[test]
    fn declared_sizes_are_not_trusted() {
        let data = read_part("word/document.xml", Cursor::new(b"<w:document/>".to_vec()), u64::MAX, 1024).unwrap();
        assert_eq!(data, b"<w:document/>");

        let err = read_part("word/media/big.png", Cursor::new(vec![0u8; 33]), 4, 32).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPart { ref part, .. } if part == "word/media/big.png"));
        assert!(read_part("x", Cursor::new(vec![0u8; 32]), 32, 32).is_ok());
    }

    #[test]
    fn rels_part_names() {
        assert_eq!(
            rels_part_name("word/document.xml"),
            "word/_rels/document.xml.rels"
        );
        assert_eq!(rels_part_name("doc.xml"), "_rels/doc.xml.rels");
    }
}
