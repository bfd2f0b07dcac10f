use parking_lot::RwLock;

use crate::chat::ChatMessage;

/// Ordered message history of one conversation.
///
/// Messages are only ever appended; readers take snapshots under a short read
/// lock so they never observe a partially appended message.
#[derive(Debug)]
pub struct Conversation {
    id: String,
    messages: RwLock<Vec<ChatMessage>>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_messages(id, Vec::new())
    }

    pub(crate) fn with_messages(id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            id: id.into(),
            messages: RwLock::new(messages),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get all stored messages in chronological order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, message: ChatMessage) {
        self.messages.write().push(message);
    }

    pub(crate) fn extend(&self, messages: Vec<ChatMessage>) {
        self.messages.write().extend(messages);
    }
}
