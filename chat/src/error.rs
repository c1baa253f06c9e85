//! Error types for the chat core.

use thiserror::Error;

/// Result type alias for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that can occur in the chat core.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Requested model is absent from the registry.
    #[error("model with ID '{id}' not found")]
    ModelNotFound { id: String },

    /// The model list could not be fetched.
    #[error("failed to fetch models: {0}")]
    ModelFetch(String),

    /// Non-success HTTP status from the completion endpoint, carrying the
    /// server-provided message.
    #[error("completion request failed: {0}")]
    CompletionRequest(String),

    /// Course catalog could not be loaded.
    #[error("course catalog error: {0}")]
    Catalog(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
