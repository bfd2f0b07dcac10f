use std::sync::Arc;

use async_trait::async_trait;
use futures::{channel::mpsc, stream};
use tokio_util::sync::CancellationToken;

use super::{concat_chunks, Aggregator};
use crate::{
    chat::{ChatMessage, ChatRole, MessageType, StreamChunk, ToolCall},
    error::RelayError,
    memory::{Conversation, ConversationStore, InMemoryStore, StoreKind},
    stream::{tee, BranchOutcome, StreamHandle},
};

fn text(s: &str) -> StreamChunk {
    StreamChunk::Text(s.to_string())
}

fn handle_for(chunks: Vec<Result<StreamChunk, RelayError>>) -> StreamHandle {
    tee(Box::pin(stream::iter(chunks)), 1)
        .pop()
        .expect("handle")
}

#[tokio::test]
async fn completed_stream_appends_query_then_reply() {
    let store = Arc::new(InMemoryStore::new());
    let handle = handle_for(vec![Ok(text("H")), Ok(text("i there")), Ok(text("!"))]);

    let outcome = Aggregator::new(store.clone(), "u1", "hi")
        .run(handle, CancellationToken::new())
        .await;

    assert_eq!(outcome, BranchOutcome::Completed);
    let messages = store.messages("u1").await;
    assert_eq!(
        messages,
        vec![
            ChatMessage::user().content("hi").build(),
            ChatMessage::assistant().content("Hi there!").build(),
        ]
    );
}

#[tokio::test]
async fn cancellation_discards_partial_reply() {
    let store = Arc::new(InMemoryStore::new());
    let (tx, source) = mpsc::unbounded();
    let handle = tee(Box::pin(source), 1).pop().expect("handle");
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Aggregator::new(store.clone(), "u1", "hi").run(handle, cancel.clone()));

    tx.unbounded_send(Ok(text("partial answer"))).expect("send");
    tokio::task::yield_now().await;
    cancel.cancel();

    assert_eq!(task.await.expect("join"), BranchOutcome::Cancelled);
    assert!(store.messages("u1").await.is_empty());
}

#[tokio::test]
async fn upstream_error_discards_partial_reply() {
    let store = Arc::new(InMemoryStore::new());
    let handle = handle_for(vec![
        Ok(text("half")),
        Err(RelayError::Upstream("reset".into())),
    ]);

    let outcome = Aggregator::new(store.clone(), "u1", "hi")
        .run(handle, CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        BranchOutcome::Failed(RelayError::Upstream("reset".into()))
    );
    assert!(store.messages("u1").await.is_empty());
}

#[tokio::test]
async fn completed_tool_calls_are_attached_to_reply() {
    let store = Arc::new(InMemoryStore::new());
    let call = ToolCall::function("call_1", "search", r#"{"q":"rust"}"#);
    let handle = handle_for(vec![
        Ok(text("Looking it up")),
        Ok(StreamChunk::ToolUseStart {
            index: 0,
            id: "call_1".into(),
            name: "search".into(),
        }),
        Ok(StreamChunk::ToolUseInputDelta {
            index: 0,
            partial_json: r#"{"q":"#.into(),
        }),
        Ok(StreamChunk::ToolUseComplete {
            index: 0,
            tool_call: call.clone(),
        }),
        Ok(StreamChunk::Done {
            stop_reason: "tool_use".into(),
        }),
    ]);

    Aggregator::new(store.clone(), "u1", "find rust")
        .run(handle, CancellationToken::new())
        .await;

    let messages = store.messages("u1").await;
    let reply = &messages[1];
    assert_eq!(reply.role, ChatRole::Assistant);
    assert_eq!(reply.content, "Looking it up");
    assert_eq!(reply.message_type, MessageType::ToolUse(vec![call]));
}

struct ReadOnlyStore;

#[async_trait]
impl ConversationStore for ReadOnlyStore {
    async fn get_or_create(&self, id: &str) -> Result<Arc<Conversation>, RelayError> {
        Ok(Arc::new(Conversation::new(id)))
    }

    async fn messages(&self, _id: &str) -> Vec<ChatMessage> {
        Vec::new()
    }

    async fn append(&self, _id: &str, _message: ChatMessage) -> Result<(), RelayError> {
        Err(RelayError::Persistence("read-only".into()))
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}

#[tokio::test]
async fn store_failure_is_reported() {
    let handle = handle_for(vec![Ok(text("ok"))]);
    let outcome = Aggregator::new(Arc::new(ReadOnlyStore), "u1", "hi")
        .run(handle, CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        BranchOutcome::Failed(RelayError::Persistence("read-only".into()))
    );
}

#[test]
fn concat_chunks_joins_text_in_order() {
    let chunks = [text("a"), text("b"), text("c")];
    assert_eq!(concat_chunks(&chunks).content, "abc");
}
