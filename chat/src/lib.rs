//! # Chat
//!
//! This crate is the core of a course-assistant chat client: it issues
//! streamed completion requests, decodes the incremental wire protocol, and
//! optionally augments answers from a vector knowledge base.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ChatClient                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ContextResolver ──► system message                             │
//! │  ModelRegistry ────► model validation                           │
//! │  map_messages ─────► CompletionRequest                          │
//! │         │                                                        │
//! │         ▼                         (best-effort, concurrent)      │
//! │  HTTP POST ──► StreamDecoder      EmbeddingProvider ──► Index   │
//! │         │            │                      │                    │
//! │         ▼            ▼                      ▼                    │
//! │     byte chunks   deltas ──────────► terminal event + note      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The one property everything here is built around: every started stream
//! produces **exactly one** terminal event, and it is always the last event,
//! whatever happens in between (HTTP error, malformed records, network
//! failure, cancellation).

pub mod context;
pub mod courses;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod format;
pub mod mapper;
pub mod message;
pub mod models;
pub mod profile;
pub mod sse;
pub mod wire;

pub use context::{ContextResolver, ResolvedContext, normalize_course_name};
pub use courses::{CourseCatalog, CourseConfig};
pub use emitter::DebouncedEmitter;
pub use engine::{
    ActiveStream, Augmentation, AugmentationConfig, CancelHandle, ChatClient, ChatExchange,
    ChatSettings, ChunkEvent, ClientConfig, StreamEvent,
};
pub use error::{ChatError, Result};
pub use format::ensure_latex_delimiters;
pub use mapper::map_messages;
pub use message::{FileAttachment, Message, MessageKind, Role};
pub use models::{Model, ModelRegistry};
pub use profile::ProfileStore;
pub use sse::{DecoderState, FeedOutcome, StreamDecoder};
