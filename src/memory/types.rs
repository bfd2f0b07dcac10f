use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{chat::ChatMessage, error::RelayError};

use super::Conversation;

/// Types of conversation stores available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process-lifetime history held in memory
    #[default]
    Memory,
    /// One JSON message per line, one file per conversation
    Jsonl,
}

/// Per-conversation message history shared by every request on the same id.
///
/// Implementations serialize mutations per conversation id only, so requests
/// on different ids never wait on each other.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the conversation for `id`, creating an empty one if needed.
    ///
    /// Concurrent calls with the same id return the same conversation.
    async fn get_or_create(&self, id: &str) -> Result<Arc<Conversation>, RelayError>;

    /// Snapshot of the messages stored for `id`; empty for unknown ids.
    async fn messages(&self, id: &str) -> Vec<ChatMessage>;

    /// Appends one message to the conversation, creating it if needed.
    async fn append(&self, id: &str, message: ChatMessage) -> Result<(), RelayError>;

    /// Appends several messages as one step.
    ///
    /// The default implementation appends one by one, so only stores that
    /// override it guarantee the messages land next to each other.
    async fn append_all(&self, id: &str, messages: Vec<ChatMessage>) -> Result<(), RelayError> {
        for message in messages {
            self.append(id, message).await?;
        }
        Ok(())
    }

    fn kind(&self) -> StoreKind;
}
