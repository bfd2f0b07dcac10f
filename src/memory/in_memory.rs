use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{chat::ChatMessage, error::RelayError};

use super::{Conversation, ConversationStore, StoreKind};

/// Unbounded in-memory conversation store.
///
/// The map lock is held only to look up or insert a conversation; appends
/// lock the individual conversation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Arc<Conversation>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a conversation without creating it.
    pub fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        self.conversations.read().get(id).cloned()
    }

    /// Inserts `conversation` unless one already exists for its id, returning
    /// whichever ends up stored.
    pub(crate) fn insert_if_absent(&self, conversation: Conversation) -> Arc<Conversation> {
        let mut map = self.conversations.write();
        map.entry(conversation.id().to_string())
            .or_insert_with(|| Arc::new(conversation))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_insert(&self, id: &str) -> Arc<Conversation> {
        if let Some(existing) = self.get(id) {
            return existing;
        }
        let mut map = self.conversations.write();
        map.entry(id.to_string())
            .or_insert_with(|| {
                log::debug!("created conversation {id}");
                Arc::new(Conversation::new(id))
            })
            .clone()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get_or_create(&self, id: &str) -> Result<Arc<Conversation>, RelayError> {
        Ok(self.get_or_insert(id))
    }

    async fn messages(&self, id: &str) -> Vec<ChatMessage> {
        self.get(id)
            .map(|conversation| conversation.messages())
            .unwrap_or_default()
    }

    async fn append(&self, id: &str, message: ChatMessage) -> Result<(), RelayError> {
        self.get_or_insert(id).push(message);
        Ok(())
    }

    async fn append_all(&self, id: &str, messages: Vec<ChatMessage>) -> Result<(), RelayError> {
        self.get_or_insert(id).extend(messages);
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}
