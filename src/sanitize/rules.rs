//! Explicit presentation injected per node kind, and the attribute allow-list.

pub const TABLE_STYLE: &str =
    "border-collapse: collapse; width: 100%; margin: 1rem 0; border: 1px solid #ddd;";
pub const ROW_STYLE: &str = "border-bottom: 1px solid #ddd;";
pub const CELL_STYLE: &str = "border: 1px solid #ddd; padding: 0.5rem;";
pub const HEADER_CELL_STYLE: &str =
    "border: 1px solid #ddd; padding: 0.5rem; background-color: #f5f5f5; font-weight: bold;";
pub const PARAGRAPH_STYLE: &str = "line-height: 1.5; margin-bottom: 0.75rem;";
pub const IMAGE_STYLE: &str = "max-width: 100%; height: auto; display: block; margin: 1rem auto;";
pub const IMAGE_CLASS: &str = "imported-image";
pub const PAGE_BREAK_CLASS: &str = "page-break";
pub const PAGE_BREAK_TEXT: &str = "Page Break";
pub const PAGE_BREAK_STYLE: &str =
    "page-break-after: always; border-top: 1px dashed #999; color: #999; text-align: center; font-size: 0.75rem; margin: 1rem 0;";

const HEADING_STYLES: [&str; 6] = [
    "font-size: 2rem; font-weight: bold; margin-top: 1.5rem; margin-bottom: 1rem;",
    "font-size: 1.5rem; font-weight: bold; margin-top: 1.25rem; margin-bottom: 0.75rem;",
    "font-size: 1.25rem; font-weight: bold; margin-top: 1rem; margin-bottom: 0.5rem;",
    "font-size: 1.1rem; font-weight: bold; margin-top: 1rem; margin-bottom: 0.5rem;",
    "font-size: 1rem; font-weight: bold; margin-top: 0.75rem; margin-bottom: 0.5rem;",
    "font-size: 0.9rem; font-weight: bold; margin-top: 0.75rem; margin-bottom: 0.5rem;",
];

/// How the sanitizer treats an element, keyed on its (lowercase) tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Kept, with its presentation made explicit.
    Keep(Option<&'static str>),
    /// Replaced by its children.
    Unwrap,
    /// Dropped together with everything inside it.
    Drop,
}

pub fn kind_of(tag: &str) -> Kind {
    match tag {
        "p" => Kind::Keep(Some(PARAGRAPH_STYLE)),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag.as_bytes()[1] - b'1';
            Kind::Keep(Some(HEADING_STYLES[level as usize]))
        }
        "ul" => Kind::Keep(Some(
            "list-style-type: disc; margin: 0.5rem 0; padding-left: 1.5rem;",
        )),
        "ol" => Kind::Keep(Some(
            "list-style-type: decimal; margin: 0.5rem 0; padding-left: 1.5rem;",
        )),
        "li" => Kind::Keep(Some("margin-bottom: 0.25rem;")),
        "table" => Kind::Keep(Some(TABLE_STYLE)),
        "thead" | "tbody" | "tfoot" => Kind::Keep(None),
        "tr" => Kind::Keep(Some(ROW_STYLE)),
        "td" => Kind::Keep(Some(CELL_STYLE)),
        "th" => Kind::Keep(Some(HEADER_CELL_STYLE)),
        "strong" | "b" => Kind::Keep(Some("font-weight: bold;")),
        "em" | "i" => Kind::Keep(Some("font-style: italic;")),
        "u" => Kind::Keep(Some("text-decoration: underline;")),
        "s" => Kind::Keep(Some("text-decoration: line-through;")),
        "sup" => Kind::Keep(Some("vertical-align: super; font-size: smaller;")),
        "sub" => Kind::Keep(Some("vertical-align: sub; font-size: smaller;")),
        "hr" => Kind::Keep(Some("border: none; border-top: 1px solid #ccc; margin: 1rem 0;")),
        "blockquote" => Kind::Keep(Some(
            "margin: 1rem 0; padding-left: 1rem; border-left: 3px solid #ddd;",
        )),
        "pre" => Kind::Keep(Some("white-space: pre-wrap; font-family: monospace;")),
        "code" => Kind::Keep(Some("font-family: monospace;")),
        "img" => Kind::Keep(Some(IMAGE_STYLE)),
        "a" | "span" | "br" => Kind::Keep(None),
        "div" | "section" | "article" | "header" | "footer" | "main" | "font" | "o:p" => {
            Kind::Unwrap
        }
        _ => Kind::Drop,
    }
}

/// Legacy spellings folded into the tag the editor understands.
pub fn canonical_tag(tag: &str) -> String {
    let tag = tag.to_ascii_lowercase();
    match tag.as_str() {
        "strike" | "del" => "s".to_string(),
        "ins" => "u".to_string(),
        _ => tag,
    }
}

/// Attributes kept for a tag besides `class` and `style`, in output order.
pub fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "img" => &["src", "alt", "title", "width", "height"],
        "a" => &["href", "title"],
        "td" | "th" => &["colspan", "rowspan"],
        "ol" => &["start"],
        _ => &[],
    }
}

pub fn is_numeric_attr(name: &str) -> bool {
    matches!(name, "width" | "height" | "colspan" | "rowspan" | "start")
}

/// Containers whose whitespace-only text children carry no meaning.
pub fn is_block_container(tag: &str) -> bool {
    matches!(
        tag,
        "table" | "thead" | "tbody" | "tfoot" | "tr" | "ul" | "ol"
    )
}

pub fn is_safe_href(href: &str) -> bool {
    let h = href.trim().to_ascii_lowercase();
    h.starts_with("http://") || h.starts_with("https://") || h.starts_with("mailto:") || h.starts_with('#')
}

/// Decoder-internal classes (`docx_*`, `docx-*`) never survive.
pub fn is_internal_class(class: &str) -> bool {
    class.to_ascii_lowercase().starts_with("docx")
}
