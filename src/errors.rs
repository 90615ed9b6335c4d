//! Error types for the quotetagger pipeline
//!
//! Most failures in the tagging path are recovered locally (a bad model
//! response costs one section its rows, never the batch). The variants here
//! cover the failures that do surface to callers: prompt construction bugs,
//! transport problems, and vector-store errors.

use thiserror::Error;

/// Main error type for the tagging pipeline
#[derive(Error, Debug)]
pub enum TaggerError {
    /// Prompt template substitution errors
    #[error("Unknown placeholder '{{{placeholder}}}' in prompt template")]
    PromptTemplate { placeholder: String },

    /// Model service errors
    #[error("Model API error: {0}")]
    ModelApi(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Embedding service errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("Tagger error: {0}")]
    Generic(String),
}

/// Result type alias for tagging operations
pub type Result<T> = std::result::Result<T, TaggerError>;

/// Convert anyhow errors to TaggerError
impl From<anyhow::Error> for TaggerError {
    fn from(err: anyhow::Error) -> Self {
        TaggerError::Generic(err.to_string())
    }
}
