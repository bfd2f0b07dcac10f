use std::sync::Arc;

use async_trait::async_trait;
use rstest::rstest;

use crate::{
    chat::{ChatMessage, ChatRole},
    error::RelayError,
    memory::{Conversation, ConversationStore, InMemoryStore, JsonlStore, StoreKind},
};

fn user(text: &str) -> ChatMessage {
    ChatMessage::user().content(text).build()
}

fn assistant(text: &str) -> ChatMessage {
    ChatMessage::assistant().content(text).build()
}

fn contents(messages: &[ChatMessage]) -> Vec<String> {
    messages.iter().map(|m| m.content.clone()).collect()
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::jsonl(StoreKind::Jsonl)]
#[tokio::test]
async fn get_or_create_twice_yields_empty_conversation(#[case] kind: StoreKind) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = build(kind, dir.path());

    let first = store.get_or_create("u1").await.expect("create");
    let second = store.get_or_create("u1").await.expect("lookup");

    assert!(first.is_empty());
    assert!(second.is_empty());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.kind(), kind);
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::jsonl(StoreKind::Jsonl)]
#[tokio::test]
async fn unknown_id_has_no_messages(#[case] kind: StoreKind) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = build(kind, dir.path());
    assert!(store.messages("missing").await.is_empty());
}

#[rstest]
#[case::memory(StoreKind::Memory)]
#[case::jsonl(StoreKind::Jsonl)]
#[tokio::test]
async fn append_preserves_insertion_order(#[case] kind: StoreKind) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = build(kind, dir.path());

    store.append("u1", user("hi")).await.expect("append");
    store
        .append_all("u1", vec![assistant("hello"), user("bye")])
        .await
        .expect("append_all");

    let messages = store.messages("u1").await;
    assert_eq!(contents(&messages), ["hi", "hello", "bye"]);
    assert_eq!(messages[1].role, ChatRole::Assistant);
}

#[tokio::test]
async fn concurrent_get_or_create_returns_same_conversation() {
    let store = Arc::new(InMemoryStore::new());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_or_create("shared").await })
        })
        .collect();

    let mut conversations = Vec::new();
    for handle in handles {
        conversations.push(handle.await.expect("join").expect("create"));
    }
    assert!(conversations
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn racing_turns_never_interleave() {
    let store = Arc::new(InMemoryStore::new());
    let long_a = "a".repeat(4096);
    let long_b = "b".repeat(4096);

    let tasks: Vec<_> = [long_a.clone(), long_b.clone()]
        .into_iter()
        .map(|text| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .append_all("same", vec![user("q"), assistant(&text)])
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("join").expect("append");
    }

    let messages = store.messages("same").await;
    assert_eq!(messages.len(), 4);
    for pair in messages.chunks(2) {
        assert_eq!(pair[0].role, ChatRole::User);
        assert_eq!(pair[1].role, ChatRole::Assistant);
        assert!(pair[1].content == long_a || pair[1].content == long_b);
    }
}

#[tokio::test]
async fn jsonl_store_reloads_history_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let store = JsonlStore::new(dir.path());
        store
            .append_all("u/1", vec![user("hi"), assistant("Hi there!")])
            .await
            .expect("append_all");
    }

    let reopened = JsonlStore::new(dir.path());
    let messages = reopened.messages("u/1").await;
    assert_eq!(contents(&messages), ["hi", "Hi there!"]);

    let conversation = reopened.get_or_create("u/1").await.expect("load");
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.id(), "u/1");
}

#[tokio::test]
async fn jsonl_store_skips_malformed_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let line = serde_json::to_string(&user("kept")).expect("serialize");
    std::fs::write(dir.path().join("u1.jsonl"), format!("not json\n{line}\n\n"))
        .expect("write fixture");

    let store = JsonlStore::new(dir.path());
    assert_eq!(contents(&store.messages("u1").await), ["kept"]);
}

/// Store relying on the default `append_all`.
#[derive(Default)]
struct AppendOnly {
    inner: InMemoryStore,
}

#[async_trait]
impl ConversationStore for AppendOnly {
    async fn get_or_create(&self, id: &str) -> Result<Arc<Conversation>, RelayError> {
        self.inner.get_or_create(id).await
    }

    async fn messages(&self, id: &str) -> Vec<ChatMessage> {
        self.inner.messages(id).await
    }

    async fn append(&self, id: &str, message: ChatMessage) -> Result<(), RelayError> {
        self.inner.append(id, message).await
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }
}

#[tokio::test]
async fn default_append_all_appends_in_order() {
    let store = AppendOnly::default();
    store
        .append_all("u1", vec![user("1"), assistant("2"), user("3")])
        .await
        .expect("append_all");
    assert_eq!(contents(&store.messages("u1").await), ["1", "2", "3"]);
}

fn build(kind: StoreKind, dir: &std::path::Path) -> Box<dyn ConversationStore> {
    match kind {
        StoreKind::Memory => Box::new(InMemoryStore::new()),
        StoreKind::Jsonl => Box::new(JsonlStore::new(dir)),
    }
}
