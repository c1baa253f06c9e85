//! Client for the remote nearest-neighbor vector index.
//!
//! The index is a hosted service with two endpoints: a stats endpoint
//! reporting the element count and a query endpoint returning scored matches
//! with metadata. The chat engine only ever uses it on the best-effort
//! augmentation path, so the convenience methods here swallow transport
//! failures into empty results.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Embedding;
use crate::error::IndexError;
use crate::similarity::ScoredMatch;

/// Client for a remote vector index.
#[derive(Clone)]
pub struct VectorIndexClient {
    /// Base URL of the index service.
    base_url: String,

    /// API key sent in the `Api-Key` header.
    api_key: String,

    /// HTTP client.
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<IndexMatch>,
}

#[derive(Deserialize)]
struct IndexMatch {
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: usize,
}

impl VectorIndexClient {
    /// Create a new client for the index at `base_url`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Number of elements in the remote index, or 0 if the request fails.
    pub async fn count(&self) -> usize {
        match self.try_count().await {
            Ok(count) => count,
            Err(err) => {
                warn!("Failed to fetch index stats: {err}");
                0
            }
        }
    }

    async fn try_count(&self) -> Result<usize, IndexError> {
        let response = self
            .client
            .get(format!("{}/index/stats", self.base_url))
            .header("Content-Type", "application/json")
            .header("Api-Key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IndexError::Api(error_text));
        }

        let stats: StatsResponse = response.json().await?;
        Ok(stats.total_vector_count)
    }

    /// Run a nearest-neighbor query against the remote index.
    ///
    /// Matches come back in the service's own (descending-score) order;
    /// `index` is their position in the result list.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>, IndexError> {
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .header("Content-Type", "application/json")
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IndexError::Api(error_text));
        }

        let result: QueryResponse = response.json().await?;
        debug!("Index query returned {} matches", result.matches.len());

        Ok(result
            .matches
            .into_iter()
            .enumerate()
            .map(|(index, m)| ScoredMatch {
                index,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }

    /// Like [`query`](Self::query), but any failure degrades to an empty
    /// result instead of propagating. Augmentation must never block the
    /// primary completion path.
    pub async fn query_best_effort(&self, vector: &Embedding, top_k: usize) -> Vec<ScoredMatch> {
        match self.query(vector, top_k).await {
            Ok(matches) => matches,
            Err(err) => {
                warn!("Index query failed, continuing without augmentation: {err}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_query_maps_matches_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("Api-Key", "pk"))
            .and(body_partial_json(serde_json::json!({
                "topK": 10,
                "includeMetadata": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [
                    { "score": 0.91, "metadata": { "content": "primer", "source": "doc1" } },
                    { "score": 0.42, "metadata": null },
                ],
            })))
            .mount(&server)
            .await;

        let client = VectorIndexClient::new(server.uri(), "pk");
        let matches = client.query(&[0.1, 0.2], 10).await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].index, 0);
        assert!((matches[0].score - 0.91).abs() < 1e-6);
        assert_eq!(
            matches[0]
                .metadata
                .as_ref()
                .and_then(|m| m.get("content"))
                .and_then(serde_json::Value::as_str),
            Some("primer")
        );
        assert_eq!(matches[1].index, 1);
    }

    #[tokio::test]
    async fn test_query_best_effort_swallows_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = VectorIndexClient::new(server.uri(), "pk");
        let matches = client.query_best_effort(&vec![0.1], 3).await;
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_count_reads_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index/stats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "totalVectorCount": 128 })),
            )
            .mount(&server)
            .await;

        let client = VectorIndexClient::new(server.uri(), "pk");
        assert_eq!(client.count().await, 128);
    }

    #[tokio::test]
    async fn test_count_zero_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index/stats"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = VectorIndexClient::new(server.uri(), "pk");
        assert_eq!(client.count().await, 0);
    }
}
