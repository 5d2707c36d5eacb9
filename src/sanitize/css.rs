//! Inline `style` declaration lists.

/// Splits on `;` outside quotes and parentheses (data URIs contain `;`).
fn split_declarations(style: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&style[start..]);
    out
}

pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    split_declarations(style)
        .into_iter()
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            if prop.is_empty() || value.is_empty() {
                return None;
            }
            let lowered = value.to_ascii_lowercase();
            if lowered.contains("expression(") || lowered.contains("javascript:") {
                return None;
            }
            Some((prop, value.to_string()))
        })
        .collect()
}

pub fn serialize(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(p, v)| format!("{p}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `injected` then `existing`; the last value per property wins while the
/// property keeps its first position. Applying it twice changes nothing.
pub fn merge(injected: &str, existing: Option<&str>) -> String {
    let mut out: Vec<(String, String)> = Vec::new();
    let all = parse_declarations(injected)
        .into_iter()
        .chain(existing.map(parse_declarations).unwrap_or_default());
    for (prop, value) in all {
        match out.iter_mut().find(|(p, _)| *p == prop) {
            Some(slot) => slot.1 = value,
            None => out.push((prop, value)),
        }
    }
    serialize(&out)
}
