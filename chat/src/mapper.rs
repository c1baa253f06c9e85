//! Maps conversation messages to the completion wire shape.

use crate::error::Result;
use crate::message::{Message, Role};
use crate::models::ModelRegistry;
use crate::wire::{CompletionMessage, ContentPart, ImageUrl, MessageContent};

/// Map a conversation history to completion messages.
///
/// Fails with [`crate::ChatError::ModelNotFound`] when `model_id` does not
/// resolve via the registry. A user message with attachments expands into a
/// multi-part content list: a leading text part, then one image part per
/// attachment carrying inline data (attachments without data are dropped).
/// Message and part order is preserved exactly.
pub async fn map_messages(
    registry: &ModelRegistry,
    model_id: &str,
    messages: &[Message],
) -> Result<Vec<CompletionMessage>> {
    registry.model_by_id(model_id).await?;
    Ok(messages.iter().map(map_message).collect())
}

fn map_message(message: &Message) -> CompletionMessage {
    if message.role == Role::User && !message.attachments.is_empty() {
        let mut parts = vec![ContentPart::Text {
            text: message.content.clone(),
        }];

        for attachment in &message.attachments {
            if let Some(data) = &attachment.inline_data {
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data.clone() },
                });
            }
        }

        return CompletionMessage {
            role: message.role,
            content: MessageContent::Parts(parts),
        };
    }

    CompletionMessage {
        role: message.role,
        content: MessageContent::Text(message.content.clone()),
    }
}
