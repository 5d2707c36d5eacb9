use thiserror::Error;

/// Whole-document decode failures. Every variant is fatal for the conversion.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not an Office Open XML package: {0}")]
    NotAPackage(String),

    #[error("legacy binary Word 97-2003 documents are not supported")]
    LegacyBinary,

    #[error("document package is missing part `{0}`")]
    MissingPart(String),

    #[error("malformed part `{part}`: {reason}")]
    MalformedPart { part: String, reason: String },

    #[error("unsupported file extension `{0}` (expected .doc or .docx)")]
    UnsupportedExtension(String),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to import document: {0}")]
    Decode(#[from] DecodeError),

    #[error("no live document to import into")]
    NoLiveDocument,

    #[error("conversion {token} superseded by conversion {latest}")]
    Superseded { token: u64, latest: u64 },

    #[error("editing surface rejected an operation: {0:#}")]
    Editor(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Stale conversions are discarded without telling the user anything.
    pub fn is_silent(&self) -> bool {
        matches!(self, ImportError::Superseded { .. })
    }

    /// Short message for the user-feedback boundary.
    pub fn user_message(&self) -> String {
        match self {
            ImportError::Decode(_) => "Failed to import document".to_string(),
            ImportError::NoLiveDocument => "Something went wrong".to_string(),
            ImportError::Superseded { .. } => String::new(),
            ImportError::Editor(_) => "Failed to import document".to_string(),
            ImportError::Config(msg) => format!("Invalid import configuration: {msg}"),
            ImportError::Io(_) => "Failed to read document".to_string(),
        }
    }
}

pub type Result<T, E = ImportError> = std::result::Result<T, E>;
