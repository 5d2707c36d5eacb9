//! Binary decoding: `.docx` payload to intermediate markup.
//!
//! Two interchangeable strategies share one body model and one emitter:
//! `StructuralExtraction` produces clean semantic tags, `RenderedLayout`
//! keeps more presentation and wraps everything in page containers.
//! Downstream stages see identical `IntermediateMarkup` either way.

mod emit;
pub mod image;
pub mod rendered;
pub mod structural;
pub mod style_map;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{DocumentKind, RawDocument};
use crate::docx::OpenedDocx;
use crate::error::DecodeError;
use crate::markup::IntermediateMarkup;

pub use image::{DataUriImageHandler, EmbeddedImage, ImageConversion, ImageHandler};
pub use rendered::RenderedLayout;
pub use structural::StructuralExtraction;
pub use style_map::{StyleMap, StyleMapError};

/// What a hard page break turns into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBreakPolicy {
    #[default]
    HorizontalRule,
    /// `div.page-break`, kept by the sanitizer as a visible marker.
    Marker,
    Ignore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Warning,
    Info,
}

/// Non-fatal note from a decoder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodeMessage {
    pub kind: MessageKind,
    pub message: String,
}

impl DecodeMessage {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MessageKind::Warning => write!(f, "warning: {}", self.message),
            MessageKind::Info => write!(f, "info: {}", self.message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Decoded {
    pub markup: IntermediateMarkup,
    pub messages: Vec<DecodeMessage>,
}

impl Decoded {
    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| m.kind == MessageKind::Warning)
    }
}

#[derive(Clone)]
pub struct DecodeOptions {
    pub image_handler: Arc<dyn ImageHandler>,
    pub style_map: StyleMap,
    pub page_breaks: PageBreakPolicy,
    /// Rendered strategy: per-run font/colour spans.
    pub inline_run_styles: bool,
    /// Rendered strategy: page size and margins on the page container.
    pub page_geometry: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            image_handler: Arc::new(DataUriImageHandler::default()),
            style_map: StyleMap::defaults(),
            page_breaks: PageBreakPolicy::default(),
            inline_run_styles: true,
            page_geometry: true,
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("style_rules", &self.style_map.rules().len())
            .field("page_breaks", &self.page_breaks)
            .field("inline_run_styles", &self.inline_run_styles)
            .field("page_geometry", &self.page_geometry)
            .finish_non_exhaustive()
    }
}

/// Turns a raw Word payload into intermediate markup.
///
/// Implementations are synchronous and CPU-bound; the pipeline runs them on
/// the blocking pool.
pub trait DecodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, raw: &RawDocument, options: &DecodeOptions) -> Result<Decoded, DecodeError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Structural,
    Rendered,
}

impl StrategyKind {
    pub fn build(self) -> Arc<dyn DecodeStrategy> {
        match self {
            StrategyKind::Structural => Arc::new(StructuralExtraction),
            StrategyKind::Rendered => Arc::new(RenderedLayout),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Structural => "structural",
            StrategyKind::Rendered => "rendered",
        }
    }
}

/// Shared package opening. A `.doc` extension is only a hint: an OOXML
/// payload behind it decodes normally, a real OLE file is refused.
pub(crate) fn open_package(raw: &RawDocument) -> Result<OpenedDocx, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::NotAPackage("empty payload".to_string()));
    }
    if raw.kind() == DocumentKind::Doc {
        tracing::debug!(name = ?raw.name(), "`.doc` payload, probing for an OOXML package");
    }
    OpenedDocx::open(raw.bytes())
}
