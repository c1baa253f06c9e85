//! # Embeddings
//!
//! This crate provides embedding generation and vector-similarity search for
//! the aula chat core.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors via a remote API
//! - **Similarity Ranking**: Cosine similarity and stable top-K selection
//! - **Remote Index**: Client for a hosted nearest-neighbor vector index
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Similarity Subsystem                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► rank_top_k / ScoredMatch   │
//! │        │                                      ▲                 │
//! │        ▼                                      │                 │
//! │   Remote API                         VectorIndexClient         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is best-effort from the caller's point of view: the chat
//! engine treats failures in this crate as "no augmentation", never as a
//! reason to fail the primary completion.

pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, IndexError, Result};
pub use index::VectorIndexClient;
pub use provider::{EmbeddingProvider, OpenAiEmbeddings};
pub use similarity::{ScoredMatch, cosine_similarity, rank_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default number of matches returned by local top-K ranking.
pub const DEFAULT_TOP_K: usize = 3;
