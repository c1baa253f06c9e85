//! Streaming completion engine.
//!
//! [`ChatClient`] owns the request lifecycle: it resolves the system
//! instruction, validates and maps the conversation, optionally spawns the
//! best-effort knowledge-base lookup, issues the HTTP request and drives the
//! [`StreamDecoder`] over the response bytes.
//!
//! The invariant the whole module is arranged around: once
//! [`ChatClient::stream_message`] hands back an [`ActiveStream`], that stream
//! yields exactly one [`StreamEvent::Completed`], and it is the last event —
//! on success, HTTP error, mid-stream network failure and cancellation
//! alike. The terminal event is produced at a single yield point after the
//! read loop, so the property holds by construction.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::stream;
use futures::Stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aula_embeddings::{EmbeddingProvider, VectorIndexClient};

use crate::context::{ContextResolver, ResolvedContext};
use crate::courses::CourseCatalog;
use crate::error::{ChatError, Result};
use crate::mapper::map_messages;
use crate::message::{FileAttachment, Message, MessageKind};
use crate::models::ModelRegistry;
use crate::profile::ProfileStore;
use crate::sse::StreamDecoder;
use crate::wire::{CompletionMessage, CompletionRequest, CompletionResponse, error_message_from_body};

/// Similarity threshold a knowledge-base match must exceed.
pub const AUGMENTATION_THRESHOLD: f32 = 0.7;

/// Connection settings for the completion and models endpoints.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Completion endpoint URL.
    pub completions_url: String,

    /// Models listing endpoint URL.
    pub models_url: String,

    /// Bearer token for both endpoints.
    pub api_key: String,

    /// Model used when the caller's settings do not name one.
    pub default_model: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            completions_url: "https://api.openai.com/v1/chat/completions".to_string(),
            models_url: "https://api.openai.com/v1/models".to_string(),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            default_model: "gpt-4o".to_string(),
        }
    }
}

impl ClientConfig {
    /// Set the completion endpoint URL.
    pub fn with_completions_url(mut self, url: impl Into<String>) -> Self {
        self.completions_url = url.into();
        self
    }

    /// Set the models endpoint URL.
    pub fn with_models_url(mut self, url: impl Into<String>) -> Self {
        self.models_url = url.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Set the default model.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

/// Per-conversation settings supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    /// Model to use; falls back to [`ClientConfig::default_model`].
    pub model: Option<String>,
}

/// Configuration of the knowledge-base augmentation step.
#[derive(Debug, Clone)]
pub struct AugmentationConfig {
    /// Normalized course name that enables augmentation.
    pub course: String,

    /// Similarity score a match must exceed to be used.
    pub threshold: f32,

    /// How many matches to request from the index.
    pub top_k: usize,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            course: "termodinamica".to_string(),
            threshold: AUGMENTATION_THRESHOLD,
            top_k: 10,
        }
    }
}

/// Embedding provider plus remote index backing the augmentation step.
pub struct Augmentation {
    provider: Arc<dyn EmbeddingProvider>,
    index: VectorIndexClient,
    config: AugmentationConfig,
}

impl Augmentation {
    /// Create an augmentation subsystem with the default configuration.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: VectorIndexClient) -> Self {
        Self {
            provider,
            index,
            config: AugmentationConfig::default(),
        }
    }

    /// Override the augmentation configuration.
    pub fn with_config(mut self, config: AugmentationConfig) -> Self {
        self.config = config;
        self
    }
}

/// One event of an active completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental content delta.
    Delta {
        content: String,
        /// Whether this is the first delta of the stream.
        first: bool,
    },

    /// The single terminal event: full composed content (accumulated deltas
    /// plus any knowledge-base note), or the error text with
    /// [`MessageKind::Error`].
    Completed { content: String, kind: MessageKind },
}

/// Callback payload for [`ChatClient::send_message_streamed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEvent {
    /// Delta content, or the full composed content when `is_end` is set.
    pub content: String,

    /// Attachments echoed to the sink (always empty today).
    pub attachments: Vec<FileAttachment>,

    /// Whether this is the terminal call.
    pub is_end: bool,

    /// Whether this exchange is the conversation's first turn. Always
    /// `false` on the terminal call.
    pub is_first: bool,

    /// Normal content or error notice.
    pub kind: MessageKind,
}

/// Cancels one in-flight stream. Cloneable; scoped to a single call.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    /// Request cooperative cancellation of the stream this handle belongs to.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// A lazy, finite, non-restartable sequence of stream events terminated by
/// exactly one [`StreamEvent::Completed`].
pub struct ActiveStream {
    events: BoxStream<'static, StreamEvent>,
    cancel: CancelHandle,
}

impl ActiveStream {
    /// Handle for cancelling this stream.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Next event, or `None` once the terminal event has been consumed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.next().await
    }
}

impl Stream for ActiveStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next_unpin(cx)
    }
}

/// Outcome of a non-streamed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatExchange {
    /// Composed answer content, including the source annotation.
    pub content: String,

    /// Whether the answer came from the knowledge base instead of the model.
    pub from_knowledge_base: bool,

    /// Model the exchange was addressed to.
    pub model: String,
}

/// The streaming completion engine.
pub struct ChatClient {
    http: reqwest::Client,
    config: ClientConfig,
    registry: ModelRegistry,
    resolver: ContextResolver,
    augmentation: Option<Augmentation>,
}

impl ChatClient {
    /// Create a client over a course catalog and profile cache.
    pub fn new(config: ClientConfig, catalog: CourseCatalog, profile: ProfileStore) -> Self {
        let registry = ModelRegistry::new(config.models_url.clone(), config.api_key.clone());
        Self {
            http: reqwest::Client::new(),
            registry,
            resolver: ContextResolver::new(catalog, profile),
            augmentation: None,
            config,
        }
    }

    /// Enable knowledge-base augmentation.
    pub fn with_augmentation(mut self, augmentation: Augmentation) -> Self {
        self.augmentation = Some(augmentation);
        self
    }

    /// The context resolver used per request.
    pub fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }

    /// The model registry backing message mapping.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Start a streamed completion exchange.
    ///
    /// Registry failures ([`ChatError::ModelNotFound`],
    /// [`ChatError::ModelFetch`]) are returned as `Err` before any stream
    /// exists. Once `Ok`, the returned stream always ends with exactly one
    /// terminal event. Running at most one stream per conversation at a time
    /// is the caller's responsibility.
    pub async fn stream_message(
        &self,
        settings: &ChatSettings,
        messages: &[Message],
        user_name: Option<&str>,
        course_id: Option<&str>,
        first_turn: bool,
    ) -> Result<ActiveStream> {
        let resolved = self.resolver.resolve(user_name, course_id, first_turn);

        // Working copy only; the caller's history is never mutated.
        let mut working = Vec::with_capacity(messages.len() + 1);
        working.push(Message::system(resolved.system_instruction.clone()));
        working.extend_from_slice(messages);

        let model_id = settings
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let mapped = map_messages(&self.registry, &model_id, &working).await?;

        let augmentation_task = self.spawn_augmentation(&resolved, &mapped);

        let request = CompletionRequest {
            model: model_id,
            messages: mapped,
            stream: true,
        };

        let cancel = CancellationToken::new();
        let handle = CancelHandle(cancel.clone());

        let http = self.http.clone();
        let url = self.config.completions_url.clone();
        let api_key = self.config.api_key.clone();
        let greeting = (first_turn && resolved.name_known)
            .then(|| format!("Hola {}, ", resolved.user_name));

        let events = stream! {
            let mut accumulated = String::new();
            let mut pending_greeting = greeting;
            let mut decoder = StreamDecoder::new();
            let mut augmentation_task = augmentation_task;

            let send = http
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&request)
                .send();
            let sent = tokio::select! {
                _ = cancel.cancelled() => None,
                result = send => Some(result),
            };

            // (content, kind) for the single terminal event; every path out
            // of the request/read sequence produces exactly one value here.
            let terminal: (String, MessageKind) = match sent {
                None => {
                    debug!("Stream cancelled before the request completed");
                    (accumulated, MessageKind::Normal)
                }
                Some(Err(err)) => {
                    warn!("Completion request failed to send: {err}");
                    (err.to_string(), MessageKind::Error)
                }
                Some(Ok(response)) if !response.status().is_success() => {
                    let body = response.text().await.unwrap_or_default();
                    let message = error_message_from_body(&body);
                    warn!("Completion endpoint returned an error: {message}");
                    (message, MessageKind::Error)
                }
                Some(Ok(response)) => {
                    let mut body = response.bytes_stream();
                    let mut first_delta = true;
                    let mut failure: Option<String> = None;
                    let mut cancelled = false;

                    loop {
                        let step = tokio::select! {
                            _ = cancel.cancelled() => None,
                            fragment = body.next() => Some(fragment),
                        };

                        let Some(fragment) = step else {
                            debug!("Stream cancelled mid-read");
                            cancelled = true;
                            break;
                        };

                        match fragment {
                            None => {
                                decoder.finish();
                                break;
                            }
                            Some(Err(err)) if cancel.is_cancelled() => {
                                // The aborted connection surfaces as a read
                                // error; treat it as normal termination.
                                debug!("Read failed after cancellation: {err}");
                                cancelled = true;
                                break;
                            }
                            Some(Err(err)) => {
                                warn!("Network error mid-stream: {err}");
                                decoder.fail();
                                failure = Some(err.to_string());
                                break;
                            }
                            Some(Ok(bytes)) => {
                                let outcome = decoder.feed(&bytes);
                                for delta in outcome.deltas {
                                    let content = if first_delta {
                                        match pending_greeting.take() {
                                            Some(greet) => format!("{greet}{delta}"),
                                            None => delta,
                                        }
                                    } else {
                                        delta
                                    };
                                    accumulated.push_str(&content);
                                    yield StreamEvent::Delta {
                                        content,
                                        first: first_delta,
                                    };
                                    first_delta = false;
                                }
                                if outcome.done {
                                    break;
                                }
                            }
                        }
                    }

                    match failure {
                        Some(message) => (message, MessageKind::Error),
                        None if cancelled => (accumulated, MessageKind::Normal),
                        None => {
                            let note = match augmentation_task.take() {
                                Some(task) => task.await.ok().flatten(),
                                None => None,
                            };
                            let content = match note {
                                Some(note) => format!("{accumulated}\n\n{note}"),
                                None => accumulated,
                            };
                            (content, MessageKind::Normal)
                        }
                    }
                }
            };

            // Augmentation is abandoned on every non-success path.
            if let Some(task) = augmentation_task.take() {
                task.abort();
            }

            let (content, kind) = terminal;
            yield StreamEvent::Completed { content, kind };
        };

        Ok(ActiveStream {
            events: Box::pin(events),
            cancel: handle,
        })
    }

    /// Callback-style adapter over [`stream_message`](Self::stream_message).
    ///
    /// Invokes `on_chunk` with zero or more non-terminal events followed by
    /// exactly one terminal event, always last.
    pub async fn send_message_streamed<F>(
        &self,
        settings: &ChatSettings,
        messages: &[Message],
        mut on_chunk: F,
        user_name: Option<&str>,
        course_id: Option<&str>,
        first_turn: bool,
    ) -> Result<()>
    where
        F: FnMut(ChunkEvent),
    {
        let mut stream = self
            .stream_message(settings, messages, user_name, course_id, first_turn)
            .await?;

        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Delta { content, .. } => on_chunk(ChunkEvent {
                    content,
                    attachments: Vec::new(),
                    is_end: false,
                    is_first: first_turn,
                    kind: MessageKind::Normal,
                }),
                StreamEvent::Completed { content, kind } => on_chunk(ChunkEvent {
                    content,
                    attachments: Vec::new(),
                    is_end: true,
                    is_first: false,
                    kind,
                }),
            }
        }

        Ok(())
    }

    /// Non-streamed exchange: answer from the knowledge base when a match
    /// clears the threshold, otherwise from a non-streamed completion.
    pub async fn send_message(
        &self,
        settings: &ChatSettings,
        messages: &[Message],
    ) -> Result<ChatExchange> {
        let model_id = settings
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());

        if let Some(answer) = self.knowledge_base_answer(messages).await {
            return Ok(ChatExchange {
                content: format!("{answer}\n\n(respuesta de la base de conocimientos)"),
                from_knowledge_base: true,
                model: model_id,
            });
        }

        let mapped = map_messages(&self.registry, &model_id, messages).await?;
        let request = CompletionRequest {
            model: model_id.clone(),
            messages: mapped,
            stream: false,
        };

        let response = self
            .http
            .post(&self.config.completions_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::CompletionRequest(error_message_from_body(&body)));
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(ChatExchange {
            content: format!("{content}\n\n(respuesta del conocimiento general)"),
            from_knowledge_base: false,
            model: model_id,
        })
    }

    async fn knowledge_base_answer(&self, messages: &[Message]) -> Option<String> {
        let augmentation = self.augmentation.as_ref()?;

        let query: String = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let embeddings = match augmentation.provider.embed(&[query]).await {
            Ok(embeddings) => embeddings,
            Err(err) => {
                warn!("Embedding failed, falling through to the model: {err}");
                return None;
            }
        };
        let vector = embeddings.into_iter().next()?;

        let matches = augmentation
            .index
            .query_best_effort(&vector, augmentation.config.top_k)
            .await;
        let best = matches.first()?;
        if best.score <= augmentation.config.threshold {
            debug!(
                "Best knowledge-base match {:.3} below threshold {:.3}",
                best.score, augmentation.config.threshold
            );
            return None;
        }

        let metadata = best.metadata.as_ref()?;
        metadata
            .get("text")
            .or_else(|| metadata.get("content"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    fn spawn_augmentation(
        &self,
        resolved: &ResolvedContext,
        mapped: &[CompletionMessage],
    ) -> Option<JoinHandle<Option<String>>> {
        let augmentation = self.augmentation.as_ref()?;
        if resolved.course_normalized.as_deref() != Some(augmentation.config.course.as_str()) {
            return None;
        }

        info!(
            "Course '{}' is augmentation-eligible, querying the knowledge base",
            augmentation.config.course
        );

        let query: String = mapped
            .iter()
            .map(|message| message.content.text())
            .collect::<Vec<_>>()
            .join(" ");
        let provider = Arc::clone(&augmentation.provider);
        let index = augmentation.index.clone();
        let config = augmentation.config.clone();

        Some(tokio::spawn(async move {
            lookup_knowledge_base(provider, index, config, query).await
        }))
    }
}

/// Best-effort knowledge-base lookup; every failure degrades to `None`.
async fn lookup_knowledge_base(
    provider: Arc<dyn EmbeddingProvider>,
    index: VectorIndexClient,
    config: AugmentationConfig,
    query: String,
) -> Option<String> {
    let embeddings = match provider.embed(std::slice::from_ref(&query)).await {
        Ok(embeddings) => embeddings,
        Err(err) => {
            warn!("Embedding failed, skipping augmentation: {err}");
            return None;
        }
    };
    let vector = embeddings.into_iter().next()?;

    let matches = index.query_best_effort(&vector, config.top_k).await;
    let best = matches.first()?;
    if best.score <= config.threshold {
        debug!(
            "Best match {:.3} below threshold {:.3}, no augmentation",
            best.score, config.threshold
        );
        return None;
    }

    let metadata = best.metadata.as_ref()?;
    let content = metadata
        .get("content")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Sin contenido relevante encontrado en la base de conocimientos.");
    let source = metadata
        .get("source")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Fuente desconocida");

    Some(format!(
        "Información obtenida de la base de conocimientos:\n{content}\n\nFuente: {source}"
    ))
}
