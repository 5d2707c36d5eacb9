use std::collections::HashMap;

use crate::error::DecodeError;

use super::xml::parse_xml_tree;

pub const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    pub fn parse(part_name: &str, data: &[u8]) -> Result<Self, DecodeError> {
        let root = parse_xml_tree(part_name, data).map_err(|e| DecodeError::MalformedPart {
            part: part_name.to_string(),
            reason: format!("{e:#}"),
        })?;
        let mut by_id = HashMap::new();
        for rel in root.elements().filter(|e| e.local() == "Relationship") {
            let (Some(id), Some(target)) = (rel.attr("Id"), rel.attr("Target")) else {
                continue;
            };
            by_id.insert(
                id.to_string(),
                Relationship {
                    id: id.to_string(),
                    rel_type: rel.attr("Type").unwrap_or_default().to_string(),
                    target: target.to_string(),
                    external: rel
                        .attr("TargetMode")
                        .is_some_and(|m| m.eq_ignore_ascii_case("external")),
                },
            );
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    pub fn by_type(&self, rel_type: &str) -> Option<&Relationship> {
        let mut matches: Vec<&Relationship> =
            self.by_id.values().filter(|r| r.rel_type == rel_type).collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.into_iter().next()
    }
}

/// Resolves a relationship target against the directory of the source part.
pub fn resolve_target(source_dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segs: Vec<&str> = source_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segs.pop();
            }
            s => segs.push(s),
        }
    }
    segs.join("/")
}

pub fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// `[Content_Types].xml`: declared media types by extension and by part.
#[derive(Clone, Debug, Default)]
pub struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    pub const PART_NAME: &'static str = "[Content_Types].xml";

    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let root = parse_xml_tree(Self::PART_NAME, data).map_err(|e| {
            DecodeError::MalformedPart {
                part: Self::PART_NAME.to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        let mut out = Self::default();
        for el in root.elements() {
            match el.local() {
                "Default" => {
                    if let (Some(ext), Some(ct)) = (el.attr("Extension"), el.attr("ContentType")) {
                        out.defaults.insert(ext.to_ascii_lowercase(), ct.to_string());
                    }
                }
                "Override" => {
                    if let (Some(part), Some(ct)) = (el.attr("PartName"), el.attr("ContentType")) {
                        out.overrides.insert(
                            part.trim_start_matches('/').to_ascii_lowercase(),
                            ct.to_string(),
                        );
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Declared type of a part, `None` when neither an override nor the extension declares one.
    pub fn declared(&self, part: &str) -> Option<&str> {
        let key = part.trim_start_matches('/').to_ascii_lowercase();
        if let Some(ct) = self.overrides.get(&key) {
            return Some(ct);
        }
        let ext = key.rsplit_once('.').map(|(_, e)| e)?;
        self.defaults.get(ext).map(|s| s.as_str())
    }
}

/// Guesses an image type from a file extension alone.
pub fn content_type_from_extension(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => return None,
    })
}
