//! Writes normalized markup into the live document and verifies that the
//! images actually arrived.

mod token;

pub use token::{ConversionToken, ConversionTokens};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::editor::EditorSurface;
use crate::error::{ImportError, Result};
use crate::markup::{image_elements, to_html, Element, Node, NormalizedMarkup};
use crate::sanitize::Normalizer;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_RECOVERY_THRESHOLD: f64 = 0.3;

#[derive(Clone, Debug, PartialEq)]
pub struct CommitOptions {
    /// Fixed wait for surfaces without a stability signal.
    pub settle_delay: Duration,
    /// Recovery runs when attached < threshold * expected.
    pub recovery_threshold: f64,
    pub stable_poll_interval: Duration,
    pub stable_timeout: Duration,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            recovery_threshold: DEFAULT_RECOVERY_THRESHOLD,
            stable_poll_interval: Duration::from_millis(25),
            stable_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub expected_images: usize,
    pub attached_images: usize,
    pub recovered_images: usize,
    pub table_count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConversionReport {
    pub fn new(expected_images: usize, attached_images: usize, table_count: usize) -> Self {
        Self {
            expected_images,
            attached_images,
            recovered_images: 0,
            table_count,
            success: attached_images >= expected_images,
            warnings: Vec::new(),
        }
    }

    /// Anything short of a clean import: missing images or decoder warnings.
    pub fn is_partial(&self) -> bool {
        !self.success || !self.warnings.is_empty()
    }
}

pub struct CommitEngine {
    tokens: Arc<ConversionTokens>,
    normalizer: Normalizer,
    options: CommitOptions,
}

impl CommitEngine {
    pub fn new(tokens: Arc<ConversionTokens>, normalizer: Normalizer, options: CommitOptions) -> Self {
        Self {
            tokens,
            normalizer,
            options,
        }
    }

    pub fn tokens(&self) -> &Arc<ConversionTokens> {
        &self.tokens
    }

    pub fn options(&self) -> &CommitOptions {
        &self.options
    }

    /// Clear, set, settle, verify, and recover missing images if too few arrived.
    ///
    /// Partial success is reported, never raised. Errors are a missing
    /// document, a superseded token, or the surface refusing an operation.
    pub async fn commit<E>(
        &self,
        doc: Option<&E>,
        markup: &NormalizedMarkup,
        token: ConversionToken,
    ) -> Result<ConversionReport>
    where
        E: EditorSurface + ?Sized,
    {
        let doc = doc.ok_or(ImportError::NoLiveDocument)?;

        self.tokens.check(token)?;
        doc.clear_content().await.map_err(ImportError::Editor)?;
        doc.set_content(&markup.to_html())
            .await
            .map_err(ImportError::Editor)?;

        self.settle(doc).await;
        self.tokens.check(token)?;

        let expected = markup.images();
        let live = doc.rendered_dom().await.map_err(ImportError::Editor)?;
        let mut report = ConversionReport::new(
            expected.len(),
            image_elements(&live).len(),
            markup.table_count(),
        );
        debug!(
            token = token.value(),
            expected = report.expected_images,
            attached = report.attached_images,
            tables = report.table_count,
            "verified commit"
        );

        if self.needs_recovery(report.expected_images, report.attached_images) {
            let missing = missing_images(&expected, &live);
            warn!(
                attached = report.attached_images,
                expected = report.expected_images,
                missing = missing.len(),
                "too few images attached, inserting missing ones individually"
            );
            for img in missing {
                self.tokens.check(token)?;
                let node: Node = self.normalizer.normalize_image(img).into();
                match doc.insert_content_at_end(&to_html(&[node])).await {
                    Ok(()) => report.recovered_images += 1,
                    Err(e) => {
                        warn!(error = %format!("{e:#}"), "recovery insert rejected");
                        report.warnings.push(format!("image insert failed: {e:#}"));
                    }
                }
            }
            let live = doc.rendered_dom().await.map_err(ImportError::Editor)?;
            report.attached_images = image_elements(&live).len();
            report.success = report.attached_images >= report.expected_images;
        }

        if report.success {
            info!(images = report.attached_images, tables = report.table_count, "document imported");
        } else {
            warn!(
                attached = report.attached_images,
                expected = report.expected_images,
                "document imported with missing images"
            );
        }
        Ok(report)
    }

    fn needs_recovery(&self, expected: usize, attached: usize) -> bool {
        expected > 0 && (attached as f64) < self.options.recovery_threshold * expected as f64
    }

    async fn settle<E: EditorSurface + ?Sized>(&self, doc: &E) {
        match doc.content_stable() {
            None => tokio::time::sleep(self.options.settle_delay).await,
            Some(true) => {}
            Some(false) => {
                let deadline = tokio::time::Instant::now() + self.options.stable_timeout;
                loop {
                    tokio::time::sleep(self.options.stable_poll_interval).await;
                    if doc.content_stable() != Some(false) {
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        debug!("editor never reported stable content, verifying anyway");
                        break;
                    }
                }
            }
        }
    }
}

/// Expected images with no counterpart (same `src`) in the live tree.
fn missing_images<'a>(expected: &[&'a Element], live: &[Node]) -> Vec<&'a Element> {
    let mut present: HashMap<&str, usize> = HashMap::new();
    for img in image_elements(live) {
        if let Some(src) = img.attr("src") {
            *present.entry(src).or_default() += 1;
        }
    }
    expected
        .iter()
        .filter(|img| {
            let src = img.attr("src").unwrap_or_default();
            match present.get_mut(src) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    false
                }
                _ => true,
            }
        })
        .copied()
        .collect()
}
