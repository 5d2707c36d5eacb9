use std::collections::HashMap;

use crate::error::DecodeError;

use super::xml::parse_xml_tree;

#[derive(Clone, Debug)]
pub struct StyleDef {
    pub name: String,
    pub based_on: Option<String>,
    pub outline_lvl: Option<u32>,
}

/// `styles.xml`: style ids as referenced from the body, with display names.
#[derive(Clone, Debug, Default)]
pub struct Styles {
    paragraph: HashMap<String, StyleDef>,
    character: HashMap<String, StyleDef>,
    table: HashMap<String, StyleDef>,
}

impl Styles {
    pub fn parse(part_name: &str, data: &[u8]) -> Result<Self, DecodeError> {
        let root = parse_xml_tree(part_name, data).map_err(|e| DecodeError::MalformedPart {
            part: part_name.to_string(),
            reason: format!("{e:#}"),
        })?;
        let mut out = Self::default();
        for style in root.children_named("w:style") {
            let Some(id) = style.attr("w:styleId") else {
                continue;
            };
            let name = style
                .child_val("w:name")
                .map(|s| s.to_string())
                .unwrap_or_else(|| id.to_string());
            let def = StyleDef {
                name,
                based_on: style.child_val("w:basedOn").map(|s| s.to_string()),
                outline_lvl: style
                    .child("w:pPr")
                    .and_then(|p| p.child_val("w:outlineLvl"))
                    .and_then(|v| v.trim().parse().ok()),
            };
            let map = match style.attr("w:type").unwrap_or("paragraph") {
                "character" => &mut out.character,
                "table" => &mut out.table,
                "paragraph" => &mut out.paragraph,
                _ => continue,
            };
            map.insert(id.to_string(), def);
        }
        Ok(out)
    }

    pub fn paragraph_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.paragraph.get(id).map(|s| s.name.as_str()).unwrap_or(id)
    }

    pub fn character_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.character.get(id).map(|s| s.name.as_str()).unwrap_or(id)
    }

    pub fn table_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.table.get(id).map(|s| s.name.as_str()).unwrap_or(id)
    }

    /// Outline level declared by the style or inherited through `w:basedOn`.
    pub fn paragraph_outline_lvl(&self, id: &str) -> Option<u32> {
        let mut cur = Some(id);
        for _ in 0..16 {
            let def = self.paragraph.get(cur?)?;
            if def.outline_lvl.is_some() {
                return def.outline_lvl;
            }
            cur = def.based_on.as_deref();
        }
        None
    }
}
