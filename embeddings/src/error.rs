//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while generating embeddings or ranking vectors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured (missing API key).
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// Non-success response from the embedding API.
    #[error("embedding API request failed: {0}")]
    Api(String),

    /// Response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Dimension mismatch between two vectors.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the remote vector index client.
///
/// Callers on the augmentation path are expected to recover from these
/// locally (see [`crate::VectorIndexClient::query_best_effort`]).
#[derive(Error, Debug)]
pub enum IndexError {
    /// Non-success response from the index endpoint.
    #[error("index API request failed: {0}")]
    Api(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
