use std::collections::HashMap;

use crate::error::DecodeError;

use super::xml::parse_xml_tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// `numbering.xml`: which (numId, ilvl) pairs are bullets and which are numbered.
#[derive(Clone, Debug, Default)]
pub struct Numbering {
    num_to_abstract: HashMap<i32, i32>,
    abstract_levels: HashMap<(i32, i32), String>,
}

impl Numbering {
    pub fn parse(part_name: &str, data: &[u8]) -> Result<Self, DecodeError> {
        let root = parse_xml_tree(part_name, data).map_err(|e| DecodeError::MalformedPart {
            part: part_name.to_string(),
            reason: format!("{e:#}"),
        })?;
        let mut out = Self::default();
        for abs in root.children_named("w:abstractNum") {
            let Some(abs_id) = abs.attr("w:abstractNumId").and_then(|v| v.parse().ok()) else {
                continue;
            };
            for lvl in abs.children_named("w:lvl") {
                let Some(ilvl) = lvl.attr("w:ilvl").and_then(|v| v.parse().ok()) else {
                    continue;
                };
                let fmt = lvl.child_val("w:numFmt").unwrap_or("decimal").to_string();
                out.abstract_levels.insert((abs_id, ilvl), fmt);
            }
        }
        for num in root.children_named("w:num") {
            let Some(num_id) = num.attr("w:numId").and_then(|v| v.parse().ok()) else {
                continue;
            };
            if let Some(abs_id) = num.child_val("w:abstractNumId").and_then(|v| v.parse().ok()) {
                out.num_to_abstract.insert(num_id, abs_id);
            }
        }
        Ok(out)
    }

    pub fn list_kind(&self, num_id: i32, ilvl: i32) -> ListKind {
        let fmt = self
            .num_to_abstract
            .get(&num_id)
            .and_then(|abs| self.abstract_levels.get(&(*abs, ilvl)));
        match fmt.map(|s| s.as_str()) {
            Some("bullet") | Some("none") => ListKind::Unordered,
            Some(_) => ListKind::Ordered,
            // Word falls back to bullets when the definition is missing.
            None => ListKind::Unordered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_formats_per_level() {
        let xml = br#"<w:numbering xmlns:w="urn:w">
            <w:abstractNum w:abstractNumId="0">
              <w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl>
              <w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl>
            </w:abstractNum>
            <w:num w:numId="3"><w:abstractNumId w:val="0"/></w:num>
        </w:numbering>"#;
        let n = Numbering::parse("word/numbering.xml", xml).unwrap();
        assert_eq!(n.list_kind(3, 0), ListKind::Ordered);
        assert_eq!(n.list_kind(3, 1), ListKind::Unordered);
        assert_eq!(n.list_kind(9, 0), ListKind::Unordered);
    }
}
