use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// One user turn addressed to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub query: String,
}

impl ChatRequest {
    pub fn new(conversation_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            query: query.into(),
        }
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.conversation_id.is_empty() {
            return Err(RelayError::InvalidRequest(
                "conversation id must not be empty".to_string(),
            ));
        }
        if self.query.is_empty() {
            return Err(RelayError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
