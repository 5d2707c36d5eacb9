use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DecodeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Doc,
    Docx,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Result<Self, DecodeError> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "doc" => Ok(Self::Doc),
            other => Err(DecodeError::UnsupportedExtension(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Docx => "docx",
        }
    }
}

/// Uploaded office document. Immutable; cloning shares the payload.
#[derive(Clone, Debug)]
pub struct RawDocument {
    kind: DocumentKind,
    bytes: Arc<[u8]>,
    name: Option<String>,
}

impl RawDocument {
    pub fn new(kind: DocumentKind, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Reads a file, taking the declared kind from its extension.
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let kind = DocumentKind::from_extension(ext)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string());
        Ok(Self {
            kind,
            bytes: bytes.into(),
            name,
        })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}
