use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the ingestion and query pipelines.
#[derive(Debug, Error)]
pub enum RagError {
    /// The PDF does not exist or could not be opened. Ingestion aborts.
    #[error("source not found: {}: {reason}", .path.display())]
    SourceNotFound { path: PathBuf, reason: String },

    /// A page could not be rendered or its artifacts could not be written.
    #[error("page extraction failed: {0}")]
    Extraction(String),

    /// The embedding provider failed. `target` names the batch or the query.
    #[error("embedding failed for {target}: {message}")]
    EmbeddingError { target: String, message: String },

    /// The vector store could not be opened, read or written.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// The language model call failed or timed out.
    #[error("synthesis failed: {0}")]
    SynthesisError(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn source_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn embedding(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_) | Self::EmbeddingError { .. })
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;
