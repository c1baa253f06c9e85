//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Zero-magnitude inputs yield 0.0 rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// A single scored match from a similarity ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMatch {
    /// Position of the matched item in its source corpus (or result list).
    pub index: usize,

    /// Cosine similarity score in `[-1, 1]`.
    pub score: f32,

    /// Metadata attached to the match, when the source carries any.
    pub metadata: Option<serde_json::Value>,
}

impl ScoredMatch {
    /// Create a new scored match with no metadata.
    pub fn new(index: usize, score: f32) -> Self {
        Self {
            index,
            score,
            metadata: None,
        }
    }

    /// Attach metadata to the match.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Rank a corpus of embeddings against a query and keep the top `k`.
///
/// The result has length `min(k, corpus.len())` and is sorted descending by
/// score; ties keep their original corpus order (stable sort).
pub fn rank_top_k(corpus: &[Embedding], query: &Embedding, k: usize) -> Result<Vec<ScoredMatch>> {
    let mut matches: Vec<ScoredMatch> = Vec::with_capacity(corpus.len());
    for (index, embedding) in corpus.iter().enumerate() {
        let score = cosine_similarity(embedding, query)?;
        matches.push(ScoredMatch::new(index, score));
    }

    // Stable sort, so equal scores keep corpus order.
    matches.sort_by_key(|m| Reverse(OrderedFloat(m.score)));
    matches.truncate(k);

    Ok(matches)
}
