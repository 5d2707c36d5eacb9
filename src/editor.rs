//! The editing surface the commit stage writes into.
//!
//! The pipeline never reaches for a global editor: callers hand it an
//! `EditorSurface` and the commit engine only uses these operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tracing::trace;

use crate::markup::{parse_fragment, plain_text, to_html, Node};

#[async_trait]
pub trait EditorSurface: Send + Sync {
    async fn clear_content(&self) -> anyhow::Result<()>;

    /// Replaces the whole document with `html` in one operation.
    async fn set_content(&self, html: &str) -> anyhow::Result<()>;

    async fn insert_content_at_end(&self, html: &str) -> anyhow::Result<()>;

    /// The live document tree as the surface currently renders it.
    async fn rendered_dom(&self) -> anyhow::Result<Vec<Node>>;

    /// `Some(true)` once the surface has finished parsing new content.
    /// Surfaces without such a signal return `None` and the caller waits
    /// a fixed settle delay instead.
    fn content_stable(&self) -> Option<bool> {
        None
    }
}

#[derive(Debug, Default)]
struct EditorState {
    nodes: Vec<Node>,
    clears: usize,
    sets: usize,
    inserts: Vec<String>,
}

/// In-process editing surface backed by the markup tree.
///
/// `with_image_budget` makes it drop images beyond a count on `set_content`,
/// the way a schema-limited editor silently loses them.
#[derive(Debug, Default)]
pub struct MemoryEditor {
    state: Mutex<EditorState>,
    image_budget: Option<usize>,
    unstable_polls: AtomicUsize,
}

impl MemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_budget(mut self, budget: usize) -> Self {
        self.image_budget = Some(budget);
        self
    }

    /// Reports "not stable yet" for the next `polls` checks.
    pub fn with_unstable_polls(self, polls: usize) -> Self {
        self.unstable_polls.store(polls, Ordering::SeqCst);
        self
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, EditorState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("editor state poisoned"))
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.lock().map(|s| s.nodes.clone()).unwrap_or_default()
    }

    pub fn to_html(&self) -> String {
        to_html(&self.nodes())
    }

    pub fn to_text(&self) -> String {
        plain_text(&self.nodes())
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(&self.nodes()).context("serialize editor content")
    }

    /// Markup passed to each `insert_content_at_end`, in call order.
    pub fn inserts(&self) -> Vec<String> {
        self.lock().map(|s| s.inserts.clone()).unwrap_or_default()
    }

    pub fn clear_count(&self) -> usize {
        self.lock().map(|s| s.clears).unwrap_or_default()
    }

    pub fn set_count(&self) -> usize {
        self.lock().map(|s| s.sets).unwrap_or_default()
    }
}

/// Removes images past `budget` in document order.
fn drop_images_over(nodes: &mut Vec<Node>, budget: usize, seen: &mut usize) {
    nodes.retain_mut(|n| match n {
        Node::Element(e) if e.is("img") => {
            *seen += 1;
            *seen <= budget
        }
        Node::Element(e) => {
            drop_images_over(&mut e.children, budget, seen);
            true
        }
        Node::Text { .. } => true,
    });
}

#[async_trait]
impl EditorSurface for MemoryEditor {
    async fn clear_content(&self) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        state.nodes.clear();
        state.clears += 1;
        Ok(())
    }

    async fn set_content(&self, html: &str) -> anyhow::Result<()> {
        let mut nodes = parse_fragment(html).context("editor rejected content")?;
        if let Some(budget) = self.image_budget {
            drop_images_over(&mut nodes, budget, &mut 0);
        }
        let mut state = self.lock()?;
        trace!(nodes = nodes.len(), "set content");
        state.nodes = nodes;
        state.sets += 1;
        Ok(())
    }

    async fn insert_content_at_end(&self, html: &str) -> anyhow::Result<()> {
        let nodes = parse_fragment(html).context("editor rejected inserted content")?;
        let mut state = self.lock()?;
        state.nodes.extend(nodes);
        state.inserts.push(html.to_string());
        Ok(())
    }

    async fn rendered_dom(&self) -> anyhow::Result<Vec<Node>> {
        Ok(self.lock()?.nodes.clone())
    }

    fn content_stable(&self) -> Option<bool> {
        let pending = self.unstable_polls.load(Ordering::SeqCst);
        if pending == 0 {
            return Some(true);
        }
        self.unstable_polls.store(pending - 1, Ordering::SeqCst);
        Some(false)
    }
}
