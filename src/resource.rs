//! Image resource references: `(mimeType, base64Payload, altText)` carried as data URIs.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::markup::Element;

pub const DEFAULT_ALT_TEXT: &str = "Imported image from Word document";
pub const PLACEHOLDER_CLASS: &str = "import-placeholder";

/// Types every renderer displays directly.
const RENDERABLE_TYPES: [&str; 8] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/svg+xml",
    "image/avif",
    "image/x-icon",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageResource {
    pub mime_type: String,
    pub base64_payload: String,
    pub alt_text: String,
}

impl ImageResource {
    pub fn from_bytes(mime_type: &str, bytes: &[u8], alt_text: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            base64_payload: B64.encode(bytes),
            alt_text: alt_text.to_string(),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_payload)
    }

    pub fn to_element(&self) -> Element {
        Element::new("img")
            .with_attr("src", self.to_data_uri())
            .with_attr("alt", self.alt_text.clone())
    }
}

/// A `data:` URI split into its declared type and base64 payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub base64_payload: String,
}

impl DataUri {
    /// Accepts only base64 data URIs. Whitespace inside the payload is dropped.
    pub fn parse(src: &str) -> Option<Self> {
        let s = src.trim();
        let rest = s
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .and_then(|_| s.get(5..))?;
        let (meta, payload) = rest.split_once(',')?;
        let mut params = meta.split(';');
        let mime_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return None;
        }
        let base64_payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        Some(Self {
            mime_type,
            base64_payload,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeClass {
    /// Directly renderable; the canonical spelling is returned.
    Concrete(&'static str),
    /// Generic, undeclared, or not something a renderer can show.
    Unclassified,
}

pub fn classify_mime(mime: &str) -> MimeClass {
    let m = mime.trim().to_ascii_lowercase();
    let canonical = match m.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg",
        "image/x-png" => "image/png",
        other => other,
    };
    match RENDERABLE_TYPES.iter().find(|t| **t == canonical) {
        Some(t) => MimeClass::Concrete(t),
        None => MimeClass::Unclassified,
    }
}

/// Magic-number sniffing over decoded payload bytes. JPEG, PNG, GIF and WEBP only.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0x47, 0x49, 0x46, 0x38]) {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

fn is_base64_payload(payload: &str) -> bool {
    !payload.is_empty()
        && payload.len() % 4 != 1
        && payload
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// Decodes just enough of the payload to sniff a signature.
pub fn payload_prefix(payload: &str) -> Option<Vec<u8>> {
    let take = payload.len().min(24) / 4 * 4;
    let head = if take == 0 { payload } else { &payload[..take] };
    B64.decode(head).ok()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The declared type was already concrete.
    Declared(ImageResource),
    /// The type was assigned from the payload signature.
    Sniffed(ImageResource),
    /// No signature matched; the fallback type was assigned.
    Defaulted(ImageResource),
}

impl Classification {
    pub fn resource(&self) -> &ImageResource {
        match self {
            Classification::Declared(r) | Classification::Sniffed(r) | Classification::Defaulted(r) => r,
        }
    }

    pub fn into_resource(self) -> ImageResource {
        match self {
            Classification::Declared(r) | Classification::Sniffed(r) | Classification::Defaulted(r) => r,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifyError {
    NotADataUri,
    EmptyPayload,
    InvalidPayload,
}

/// Turns an image `src` into a concretely typed resource, or explains why it cannot be.
pub fn classify_image_src(
    src: &str,
    alt: Option<&str>,
    fallback_alt: &str,
    unknown_mime: &str,
) -> Result<Classification, ClassifyError> {
    let uri = DataUri::parse(src).ok_or(ClassifyError::NotADataUri)?;
    if uri.base64_payload.is_empty() {
        return Err(ClassifyError::EmptyPayload);
    }
    if !is_base64_payload(&uri.base64_payload) {
        return Err(ClassifyError::InvalidPayload);
    }
    let alt_text = alt
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(fallback_alt)
        .to_string();
    let build = |mime: &str| ImageResource {
        mime_type: mime.to_string(),
        base64_payload: uri.base64_payload.clone(),
        alt_text: alt_text.clone(),
    };
    if let MimeClass::Concrete(mime) = classify_mime(&uri.mime_type) {
        return Ok(Classification::Declared(build(mime)));
    }
    let prefix = payload_prefix(&uri.base64_payload).ok_or(ClassifyError::InvalidPayload)?;
    Ok(match sniff_image_type(&prefix) {
        Some(mime) => Classification::Sniffed(build(mime)),
        None => Classification::Defaulted(build(unknown_mime)),
    })
}

/// Inert inline stand-in for an image that could not be converted.
pub fn image_placeholder(alt: Option<&str>) -> Element {
    let label = match alt.map(str::trim).filter(|a| !a.is_empty()) {
        Some(alt) => format!("[Image: {alt}]"),
        None => "[Image could not be imported]".to_string(),
    };
    Element::new("span")
        .with_attr("class", PLACEHOLDER_CLASS)
        .with_text(label)
}
