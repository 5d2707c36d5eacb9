//! Declarative mapping from Word style names to markup tags.
//!
//! One rule per line, `selector => target`:
//!
//! ```text
//! p[style-name='Heading 1'] => h1:fresh
//! r[style-name='Code'] => code
//! table[style-name='Invoice'] => table.invoice
//! p[style-name='Comment'] => !
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(p|r|table)\s*(?:\[\s*style-name\s*=\s*(?:'([^']*)'|"([^"]*)")\s*\])?\s*=>\s*(.*?)\s*$"#,
    )
    .expect("style rule regex")
});

static TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*)((?:\.[A-Za-z_][A-Za-z0-9_-]*)*)(:fresh)?$")
        .expect("style target regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    Paragraph,
    Run,
    Table,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Element { tag: String, classes: Vec<String> },
    /// `!`: drop whatever matched.
    Ignore,
}

impl Target {
    pub fn element(tag: &str) -> Self {
        Target::Element {
            tag: tag.to_string(),
            classes: Vec::new(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Target::Element { tag, .. } => Some(tag),
            Target::Ignore => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: Selector,
    /// `None` matches any style, including none at all.
    pub style_name: Option<String>,
    pub target: Target,
}

#[derive(Debug, thiserror::Error)]
#[error("style map line {line}: {reason}")]
pub struct StyleMapError {
    pub line: usize,
    pub reason: String,
}

impl StyleRule {
    pub fn parse(line: &str) -> Result<Self, String> {
        let caps = RULE_RE
            .captures(line)
            .ok_or_else(|| format!("expected `selector => target`, got `{}`", line.trim()))?;
        let selector = match &caps[1] {
            "p" => Selector::Paragraph,
            "r" => Selector::Run,
            _ => Selector::Table,
        };
        let style_name = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string());
        let raw_target = &caps[4];
        let target = if raw_target == "!" {
            Target::Ignore
        } else {
            let t = TARGET_RE
                .captures(raw_target)
                .ok_or_else(|| format!("invalid target `{raw_target}`"))?;
            Target::Element {
                tag: t[1].to_ascii_lowercase(),
                classes: t[2]
                    .split('.')
                    .filter(|c| !c.is_empty())
                    .map(|c| c.to_string())
                    .collect(),
            }
        };
        Ok(Self {
            selector,
            style_name,
            target,
        })
    }

    fn matches(&self, selector: Selector, style_name: Option<&str>) -> bool {
        if self.selector != selector {
            return false;
        }
        match (&self.style_name, style_name) {
            (None, _) => true,
            (Some(want), Some(have)) => want.trim().eq_ignore_ascii_case(have.trim()),
            (Some(_), None) => false,
        }
    }
}

const DEFAULT_RULES: &str = "\
p[style-name='Heading 1'] => h1:fresh
p[style-name='Heading 2'] => h2:fresh
p[style-name='Heading 3'] => h3:fresh
p[style-name='Heading 4'] => h4:fresh
p[style-name='Heading 5'] => h5:fresh
p[style-name='Heading 6'] => h6:fresh
p[style-name='Title'] => h1:fresh
p[style-name='List Paragraph'] => li
p[style-name='Page Break'] => hr
r[style-name='Strong'] => strong
r[style-name='Emphasis'] => em
table => table.imported-table
p => p:fresh";

/// User rules first, then (optionally) the built-in defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleMap {
    rules: Vec<StyleRule>,
}

impl StyleMap {
    pub fn parse(text: &str) -> Result<Self, StyleMapError> {
        let mut rules = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rule = StyleRule::parse(line).map_err(|reason| StyleMapError {
                line: i + 1,
                reason,
            })?;
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    pub fn defaults() -> Self {
        Self {
            rules: DEFAULT_RULES
                .lines()
                .filter_map(|l| StyleRule::parse(l).ok())
                .collect(),
        }
    }

    /// `user_lines` take precedence over the defaults.
    pub fn with_defaults(user_lines: &[String], include_defaults: bool) -> Result<Self, StyleMapError> {
        let mut map = Self::parse(&user_lines.join("\n"))?;
        if include_defaults {
            map.rules.extend(Self::defaults().rules);
        }
        Ok(map)
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn lookup(&self, selector: Selector, style_name: Option<&str>) -> Option<&Target> {
        self.rules
            .iter()
            .find(|r| r.matches(selector, style_name))
            .map(|r| &r.target)
    }

    /// Whether a rule names this style explicitly (catch-alls do not count).
    pub fn names(&self, selector: Selector, style_name: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.style_name.is_some() && r.matches(selector, Some(style_name)))
    }
}
