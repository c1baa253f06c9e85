//! Conversation messages as the caller sees them.
//!
//! A conversation is an ordered, append-only sequence of [`Message`]s for
//! the duration of one exchange. The engine prepends a synthesized System
//! message to its own working copy per request; the caller's history is
//! never mutated.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Whether a message carries normal content or an error notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Normal,
    Error,
}

/// A file attached to a user message.
///
/// Attachments without inline data are dropped during mapping; the core
/// never dereferences them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    /// MIME kind of the attachment (e.g. `image/png`).
    pub mime_kind: String,

    /// Base64 payload, typically a data URL for images.
    pub inline_data: Option<String>,
}

impl FileAttachment {
    /// Create an attachment carrying inline data.
    pub fn inline(mime_kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_kind: mime_kind.into(),
            inline_data: Some(data.into()),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,

    /// Text content.
    pub content: String,

    /// Normal content or error notice.
    pub kind: MessageKind,

    /// Files attached to the message, in attachment order.
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

impl Message {
    /// Create a message with no attachments.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            kind: MessageKind::Normal,
            attachments: Vec::new(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attach files to the message.
    pub fn with_attachments(mut self, attachments: Vec<FileAttachment>) -> Self {
        self.attachments = attachments;
        self
    }
}
