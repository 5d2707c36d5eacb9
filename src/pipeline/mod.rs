//! Decode, normalize and commit one document, reporting status along the way.

mod config;

pub use config::{init_default_config, PipelineConfig};

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::commit::{CommitEngine, ConversionReport, ConversionToken, ConversionTokens};
use crate::decode::{DecodeMessage, DecodeOptions, DecodeStrategy, MessageKind};
use crate::document::RawDocument;
use crate::editor::EditorSurface;
use crate::error::{ImportError, Result};
use crate::markup::{IntermediateMarkup, NormalizedMarkup};
use crate::progress::{FeedbackSink, ImportStatus};
use crate::sanitize::{Normalizer, SanitizeStats};

/// Result of decode + normalize, before anything touches a document.
#[derive(Clone, Debug)]
pub struct Conversion {
    pub intermediate: IntermediateMarkup,
    pub normalized: NormalizedMarkup,
    pub messages: Vec<DecodeMessage>,
    pub stats: SanitizeStats,
}

impl Conversion {
    pub fn warnings(&self) -> impl Iterator<Item = &DecodeMessage> {
        self.messages.iter().filter(|m| m.kind == MessageKind::Warning)
    }
}

pub struct ImportPipeline {
    decoder: Arc<dyn DecodeStrategy>,
    decode_options: DecodeOptions,
    normalizer: Normalizer,
    commit: CommitEngine,
    feedback: Arc<dyn FeedbackSink>,
}

impl ImportPipeline {
    pub fn new(cfg: PipelineConfig, feedback: Arc<dyn FeedbackSink>) -> Self {
        let normalizer = Normalizer::new(cfg.sanitize);
        let commit = CommitEngine::new(
            Arc::new(ConversionTokens::new()),
            normalizer.clone(),
            cfg.commit,
        );
        Self {
            decoder: cfg.strategy.build(),
            decode_options: cfg.decode,
            normalizer,
            commit,
            feedback,
        }
    }

    /// Swaps in another decode strategy; everything after decoding is shared.
    pub fn with_decoder(mut self, decoder: Arc<dyn DecodeStrategy>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    pub fn tokens(&self) -> &Arc<ConversionTokens> {
        self.commit.tokens()
    }

    /// Decode on the blocking pool, then normalize.
    pub async fn convert(&self, raw: RawDocument) -> Result<Conversion> {
        info!(
            strategy = self.decoder.name(),
            kind = raw.kind().as_str(),
            bytes = raw.len(),
            digest = %raw.digest(),
            "decoding document"
        );
        let decoder = self.decoder.clone();
        let options = self.decode_options.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&raw, &options))
            .await
            .map_err(|e| ImportError::Io(std::io::Error::other(format!("decode task: {e}"))))??;

        for m in &decoded.messages {
            warn!(message = %m.message, "decoder message");
        }
        let intermediate = decoded.markup;
        let (normalized, stats) = self.normalizer.normalize_with_stats(intermediate.clone());
        info!(
            images = normalized.image_count(),
            tables = normalized.table_count(),
            warnings = decoded.messages.len(),
            "document normalized"
        );
        Ok(Conversion {
            intermediate,
            normalized,
            messages: decoded.messages,
            stats,
        })
    }

    /// Full import into `doc`. Emits `Loading` then exactly one terminal
    /// status, except for superseded conversions, which stay silent.
    pub async fn import<E>(&self, raw: RawDocument, doc: Option<&E>) -> Result<ConversionReport>
    where
        E: EditorSurface + ?Sized,
    {
        let token = self.tokens().issue();
        self.feedback.status(&ImportStatus::Loading);

        let result = match self.convert(raw).await {
            Ok(conversion) => self.apply(&conversion, doc, token).await,
            Err(e) => Err(e),
        };
        self.finish(&result);
        result
    }

    /// Commits an already converted document, for callers that inspect the
    /// conversion first.
    pub async fn import_converted<E>(&self, conversion: &Conversion, doc: Option<&E>) -> Result<ConversionReport>
    where
        E: EditorSurface + ?Sized,
    {
        let token = self.tokens().issue();
        self.feedback.status(&ImportStatus::Loading);
        let result = self.apply(conversion, doc, token).await;
        self.finish(&result);
        result
    }

    fn finish(&self, result: &Result<ConversionReport>) {
        match result {
            Ok(report) if report.is_partial() => self.feedback.status(&ImportStatus::PartialSuccess),
            Ok(_) => self.feedback.status(&ImportStatus::Success),
            Err(e) if e.is_silent() => debug!(error = %e, "discarding stale conversion"),
            Err(e) => {
                error!(error = %e, "import failed");
                self.feedback.status(&ImportStatus::Failure(e.user_message()));
            }
        }
    }

    async fn apply<E>(&self, conversion: &Conversion, doc: Option<&E>, token: ConversionToken) -> Result<ConversionReport>
    where
        E: EditorSurface + ?Sized,
    {
        let mut report = self.commit.commit(doc, &conversion.normalized, token).await?;
        let mut warnings: Vec<String> = conversion.warnings().map(|m| m.message.clone()).collect();
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::commit::CommitOptions;
    use crate::config::AppConfig;
    use crate::decode::{DecodeStrategy, Decoded, RenderedLayout};
    use crate::document::DocumentKind;
    use crate::docx::fixture::{drawing_run, png_bytes, DocxFixture};
    use crate::editor::MemoryEditor;
    use crate::error::DecodeError;
    use crate::markup::{count_elements, image_elements};
    use crate::progress::RecordingFeedback;
    use crate::resource::DataUri;

    const STYLES: &str = r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>"#;

    fn cell(text: &str) -> String {
        format!("<w:tc><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:tc>")
    }

    /// Heading, one 2x2 table and one PNG.
    fn one_page_docx() -> RawDocument {
        let table = format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
            cell("a"),
            cell("b"),
            cell("c"),
            cell("d")
        );
        let bytes = DocxFixture::new()
            .styles(STYLES)
            .paragraph(r#"<w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quarterly report</w:t></w:r>"#)
            .block(&table)
            .paragraph(&drawing_run("rIdImg", "Chart"))
            .media("rIdImg", "media/image1.png", png_bytes())
            .build();
        RawDocument::new(DocumentKind::Docx, bytes).with_name("report.docx")
    }

    fn quick_config() -> PipelineConfig {
        PipelineConfig {
            commit: CommitOptions {
                settle_delay: Duration::ZERO,
                ..CommitOptions::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn pipeline() -> (ImportPipeline, Arc<RecordingFeedback>) {
        let feedback = Arc::new(RecordingFeedback::new());
        (ImportPipeline::new(quick_config(), feedback.clone()), feedback)
    }

    fn assert_one_page_shape(normalized: &NormalizedMarkup) {
        let nodes = normalized.nodes();
        let headings = count_elements(nodes, |e| {
            matches!(e.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
        });
        assert_eq!(headings, 1);
        assert_eq!(normalized.table_count(), 1);
        assert_eq!(count_elements(nodes, |e| e.is("td") || e.is("th")), 4);
        let images = image_elements(nodes);
        assert_eq!(images.len(), 1);
        let uri = DataUri::parse(images[0].attr("src").unwrap()).unwrap();
        assert_eq!(uri.mime_type, "image/png");
        assert_eq!(images[0].attr("alt"), Some("Chart"));
    }

    #[tokio::test]
    async fn heading_table_and_png_end_to_end() {
        let (pipeline, feedback) = pipeline();
        let conversion = pipeline.convert(one_page_docx()).await.unwrap();
        assert_one_page_shape(&conversion.normalized);
        assert_eq!(conversion.stats.dropped_nodes, 0);

        let editor = MemoryEditor::new();
        let report = pipeline.import(one_page_docx(), Some(&editor)).await.unwrap();
        assert_eq!(report, ConversionReport::new(1, 1, 1));
        assert_eq!(
            feedback.statuses(),
            vec![ImportStatus::Loading, ImportStatus::Success]
        );
        assert!(editor.to_text().contains("Quarterly report"));

        let again = pipeline.import_converted(&conversion, Some(&editor)).await.unwrap();
        assert_eq!(again, report);
        assert_eq!(editor.clear_count(), 2);
    }

    #[tokio::test]
    async fn rendered_strategy_normalizes_to_the_same_shape() {
        let (pipeline, _) = pipeline();
        let pipeline = pipeline.with_decoder(Arc::new(RenderedLayout));
        assert_eq!(pipeline.decoder_name(), "rendered");
        let conversion = pipeline.convert(one_page_docx()).await.unwrap();
        assert_one_page_shape(&conversion.normalized);
        assert!(!conversion.normalized.to_html().contains("docx"));
    }

    #[tokio::test]
    async fn markup_special_characters_survive_the_editor() {
        let bytes = DocxFixture::new()
            .paragraph("<w:r><w:t>R&amp;D budget &lt;draft&gt; &quot;v2&quot;</w:t></w:r>")
            .paragraph(&drawing_run("rIdImg", "Sales &amp; &quot;costs&quot;"))
            .media("rIdImg", "media/image1.png", png_bytes())
            .build();
        let (pipeline, feedback) = pipeline();
        let editor = MemoryEditor::new();
        let report = pipeline
            .import(RawDocument::new(DocumentKind::Docx, bytes), Some(&editor))
            .await
            .unwrap();
        assert_eq!(report, ConversionReport::new(1, 1, 0));
        assert_eq!(
            feedback.statuses(),
            vec![ImportStatus::Loading, ImportStatus::Success]
        );
        assert!(editor.to_text().contains("R&D budget <draft> \"v2\""));
        let live = editor.nodes();
        let images = image_elements(&live);
        assert_eq!(images[0].attr("alt"), Some("Sales & \"costs\""));
    }

    #[tokio::test]
    async fn configured_fallback_alt_reaches_decoded_images() {
        let app: AppConfig = toml::from_str("[sanitize]\nfallback_alt = \"Figure\"\n").unwrap();
        let cfg = PipelineConfig::from_app_config(&app).unwrap();
        let pipeline = ImportPipeline::new(cfg, Arc::new(RecordingFeedback::new()));
        let bytes = DocxFixture::new()
            .paragraph(&drawing_run("rIdImg", ""))
            .media("rIdImg", "media/image1.png", png_bytes())
            .build();
        let conversion = pipeline
            .convert(RawDocument::new(DocumentKind::Docx, bytes))
            .await
            .unwrap();
        let images = conversion.normalized.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].attr("alt"), Some("Figure"));
    }

    #[tokio::test]
    async fn decoder_warnings_make_the_outcome_partial() {
        let bytes = DocxFixture::new()
            .paragraph(&drawing_run("rIdGone", "Lost"))
            .dangling_image("rIdGone", "media/gone.png")
            .build();
        let (pipeline, feedback) = pipeline();
        let editor = MemoryEditor::new();
        let report = pipeline
            .import(RawDocument::new(DocumentKind::Docx, bytes), Some(&editor))
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.expected_images, 0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(feedback.last(), Some(ImportStatus::PartialSuccess));
        assert!(editor.to_text().contains("[Image: Lost]"));
    }

    #[tokio::test]
    async fn unsupported_payload_fails_visibly() {
        let (pipeline, feedback) = pipeline();
        let editor = MemoryEditor::new();
        let raw = RawDocument::new(DocumentKind::Docx, b"plain text, not a zip".to_vec());
        let err = pipeline.import(raw, Some(&editor)).await.unwrap_err();
        assert!(matches!(err, ImportError::Decode(_)));
        assert_eq!(
            feedback.last(),
            Some(ImportStatus::Failure("Failed to import document".to_string()))
        );
        assert_eq!(editor.set_count(), 0);
    }

    #[tokio::test]
    async fn missing_document_fails_visibly() {
        let (pipeline, feedback) = pipeline();
        let err = pipeline
            .import::<MemoryEditor>(one_page_docx(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NoLiveDocument));
        assert_eq!(
            feedback.last(),
            Some(ImportStatus::Failure("Something went wrong".to_string()))
        );
    }

    /// Issues a newer token while decoding, as a second import would.
    struct Overtaken {
        tokens: Arc<ConversionTokens>,
    }

    impl DecodeStrategy for Overtaken {
        fn name(&self) -> &'static str {
            "overtaken"
        }

        fn decode(&self, _raw: &RawDocument, _options: &DecodeOptions) -> std::result::Result<Decoded, DecodeError> {
            self.tokens.issue();
            Ok(Decoded {
                markup: IntermediateMarkup::parse_html("<p>late</p>").map_err(|e| DecodeError::MalformedPart {
                    part: "test".into(),
                    reason: e.to_string(),
                })?,
                messages: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn superseded_import_is_silent_and_leaves_the_document() {
        let (pipeline, feedback) = pipeline();
        let tokens = pipeline.tokens().clone();
        let pipeline = pipeline.with_decoder(Arc::new(Overtaken { tokens }));
        let editor = MemoryEditor::new();
        editor.set_content("<p>current</p>").await.unwrap();

        let err = pipeline.import(one_page_docx(), Some(&editor)).await.unwrap_err();
        assert!(err.is_silent());
        assert_eq!(feedback.statuses(), vec![ImportStatus::Loading]);
        assert_eq!(editor.to_html(), "<p>current</p>");
    }
}
