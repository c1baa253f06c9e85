//! Model registry: fetches, filters and memoizes the available models.

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{ChatError, Result};
use crate::wire::ModelsResponse;

/// A chat-capable model with its static capability metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier.
    pub id: String,

    /// Context window size in tokens (0 when unknown).
    pub context_window: u32,

    /// Knowledge cutoff date (empty when unknown).
    pub knowledge_cutoff: String,

    /// Whether the model accepts image parts.
    pub image_support: bool,

    /// Whether this model is preferred in pickers.
    pub preferred: bool,

    /// Whether this model is deprecated.
    pub deprecated: bool,
}

/// Static capability metadata keyed by model id.
///
/// Ids missing from this table get zero/false defaults.
fn capability_metadata(id: &str) -> (u32, &'static str, bool, bool, bool) {
    match id {
        "gpt-4o" => (128_000, "2023-10", true, true, false),
        "gpt-4o-mini" => (128_000, "2023-10", true, false, false),
        "gpt-4-turbo" => (128_000, "2023-12", true, false, false),
        "gpt-4" => (8_192, "2021-09", false, false, false),
        "gpt-3.5-turbo" => (16_385, "2021-09", false, false, true),
        _ => (0, "", false, false, false),
    }
}

/// Caches and filters the list of available models.
///
/// The list is fetched once and memoized for the registry's lifetime;
/// failed fetches are not cached, so a later call retries.
pub struct ModelRegistry {
    client: reqwest::Client,
    models_url: String,
    api_key: String,
    cache: OnceCell<Vec<Model>>,
}

impl ModelRegistry {
    /// Create a registry for the models endpoint at `models_url`.
    pub fn new(models_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            models_url: models_url.into(),
            api_key: api_key.into(),
            cache: OnceCell::new(),
        }
    }

    /// All chat-capable models, sorted descending by id.
    pub async fn models(&self) -> Result<&[Model]> {
        let models = self
            .cache
            .get_or_try_init(|| self.fetch_models())
            .await?;
        Ok(models)
    }

    /// Look up a model by id.
    pub async fn model_by_id(&self, id: &str) -> Result<Model> {
        let models = self.models().await?;
        models
            .iter()
            .find(|model| model.id == id)
            .cloned()
            .ok_or_else(|| ChatError::ModelNotFound { id: id.to_string() })
    }

    async fn fetch_models(&self) -> Result<Vec<Model>> {
        debug!("Fetching model list from {}", self.models_url);

        let response = self
            .client
            .get(&self.models_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ChatError::ModelFetch(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::ModelFetch(crate::wire::error_message_from_body(
                &body,
            )));
        }

        let listing: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ModelFetch(e.to_string()))?;

        let mut models: Vec<Model> = listing
            .data
            .into_iter()
            .filter(|entry| entry.id.starts_with("gpt-"))
            .map(|entry| {
                let (context_window, knowledge_cutoff, image_support, preferred, deprecated) =
                    capability_metadata(&entry.id);
                Model {
                    id: entry.id,
                    context_window,
                    knowledge_cutoff: knowledge_cutoff.to_string(),
                    image_support,
                    preferred,
                    deprecated,
                }
            })
            .collect();

        models.sort_by(|a, b| b.id.cmp(&a.id));
        info!("Loaded {} chat models", models.len());

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn models_body() -> serde_json::Value {
        serde_json::json!({
            "data": [
                { "id": "gpt-3.5-turbo" },
                { "id": "whisper-1" },
                { "id": "gpt-4o" },
                { "id": "text-embedding-ada-002" },
            ],
        })
    }

    #[tokio::test]
    async fn test_models_filters_and_sorts_descending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
            .mount(&server)
            .await;

        let registry = ModelRegistry::new(format!("{}/models", server.uri()), "key");
        let models = registry.models().await.unwrap();

        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["gpt-4o", "gpt-3.5-turbo"]);
    }

    #[tokio::test]
    async fn test_models_enriches_known_ids_and_defaults_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "id": "gpt-4o" }, { "id": "gpt-zz-experimental" }],
            })))
            .mount(&server)
            .await;

        let registry = ModelRegistry::new(format!("{}/models", server.uri()), "key");
        let gpt4o = registry.model_by_id("gpt-4o").await.unwrap();
        assert_eq!(gpt4o.context_window, 128_000);
        assert!(gpt4o.image_support);

        let unknown = registry.model_by_id("gpt-zz-experimental").await.unwrap();
        assert_eq!(unknown.context_window, 0);
        assert_eq!(unknown.knowledge_cutoff, "");
        assert!(!unknown.image_support);
        assert!(!unknown.preferred);
        assert!(!unknown.deprecated);
    }

    #[tokio::test]
    async fn test_models_memoized_after_first_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
            .expect(1)
            .mount(&server)
            .await;

        let registry = ModelRegistry::new(format!("{}/models", server.uri()), "key");
        registry.models().await.unwrap();
        registry.models().await.unwrap();
        registry.model_by_id("gpt-4o").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_model_id_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
            .mount(&server)
            .await;

        let registry = ModelRegistry::new(format!("{}/models", server.uri()), "key");
        let err = registry.model_by_id("gpt-imaginary").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelNotFound { id } if id == "gpt-imaginary"));
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "bad api key" },
            })))
            .mount(&server)
            .await;

        let registry = ModelRegistry::new(format!("{}/models", server.uri()), "key");
        let err = registry.models().await.unwrap_err();
        assert!(matches!(err, ChatError::ModelFetch(msg) if msg == "bad api key"));
    }
}
