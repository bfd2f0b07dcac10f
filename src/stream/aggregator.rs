use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    chat::{ChatMessage, StreamChunk, ToolCall},
    error::RelayError,
    memory::ConversationStore,
};

use super::{BranchOutcome, StreamHandle};

/// Collects one tee branch into the assistant reply and commits the turn.
///
/// The turn is written only when the stream ends normally. On cancellation
/// or upstream failure the partial reply is dropped and nothing is appended,
/// not even the user query.
pub struct Aggregator {
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
    query: String,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        conversation_id: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            store,
            conversation_id: conversation_id.into(),
            query: query.into(),
        }
    }

    pub async fn run(self, mut handle: StreamHandle, cancel: CancellationToken) -> BranchOutcome {
        let mut reply = ReplyBuffer::default();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    handle.close();
                    log::debug!(
                        "conversation {}: cancelled, discarding {} bytes of reply",
                        self.conversation_id,
                        reply.content.len()
                    );
                    return BranchOutcome::Cancelled;
                }
                item = handle.recv() => match item {
                    Some(Ok(chunk)) => reply.push(chunk),
                    Some(Err(err)) => {
                        handle.close();
                        log::warn!(
                            "conversation {}: stream failed, reply not saved: {err}",
                            self.conversation_id
                        );
                        return BranchOutcome::Failed(RelayError::upstream(err));
                    }
                    None => break,
                },
            }
        }
        handle.close();
        self.commit(reply.into_message()).await
    }

    async fn commit(self, reply: ChatMessage) -> BranchOutcome {
        let turn = vec![ChatMessage::user().content(self.query).build(), reply];
        match self.store.append_all(&self.conversation_id, turn).await {
            Ok(()) => {
                log::debug!("conversation {}: turn saved", self.conversation_id);
                BranchOutcome::Completed
            }
            Err(err) => {
                log::warn!(
                    "conversation {}: failed to save turn: {err}",
                    self.conversation_id
                );
                BranchOutcome::Failed(err)
            }
        }
    }
}

/// Concatenates chunks, in order, into a single assistant message.
pub fn concat_chunks<'a>(chunks: impl IntoIterator<Item = &'a StreamChunk>) -> ChatMessage {
    let mut reply = ReplyBuffer::default();
    for chunk in chunks {
        reply.push(chunk.clone());
    }
    reply.into_message()
}

#[derive(Debug, Default)]
struct ReplyBuffer {
    content: String,
    tool_calls: Vec<ToolCall>,
}

impl ReplyBuffer {
    fn push(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::Text(text) => self.content.push_str(&text),
            StreamChunk::ToolUseComplete { tool_call, .. } => self.tool_calls.push(tool_call),
            StreamChunk::ToolUseStart { .. }
            | StreamChunk::ToolUseInputDelta { .. }
            | StreamChunk::Done { .. } => {}
        }
    }

    fn into_message(self) -> ChatMessage {
        let builder = ChatMessage::assistant().content(self.content);
        if self.tool_calls.is_empty() {
            builder.build()
        } else {
            builder.tool_use(self.tool_calls).build()
        }
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
