use std::{
    collections::HashMap,
    fmt::Write as _,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use crate::{chat::ChatMessage, error::RelayError};

use super::{Conversation, ConversationStore, InMemoryStore, StoreKind};

const FILE_EXTENSION: &str = "jsonl";

/// Durable conversation store writing one JSON message per line.
///
/// Each conversation lives in `<dir>/<escaped id>.jsonl` and is loaded into
/// memory on first access. Writes for one id are serialized by a per-id gate,
/// so the file and the in-memory copy always hold the same sequence.
#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    cache: InMemoryStore,
    gates: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: InMemoryStore::new(),
            gates: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{FILE_EXTENSION}", escape_id(id)))
    }

    fn gate(&self, id: &str) -> Arc<Mutex<()>> {
        self.gates
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, id: &str) -> Result<Arc<Conversation>, RelayError> {
        if let Some(conversation) = self.cache.get(id) {
            return Ok(conversation);
        }
        let gate = self.gate(id);
        let _guard = gate.lock().await;
        if let Some(conversation) = self.cache.get(id) {
            return Ok(conversation);
        }
        let messages = read_messages(&self.path_for(id)).await?;
        log::debug!("loaded {} messages for conversation {id}", messages.len());
        Ok(self
            .cache
            .insert_if_absent(Conversation::with_messages(id, messages)))
    }

    async fn write(&self, id: &str, messages: Vec<ChatMessage>) -> Result<(), RelayError> {
        let conversation = self.load(id).await?;
        let gate = self.gate(id);
        let _guard = gate.lock().await;
        fs::create_dir_all(&self.dir).await?;
        append_lines(&self.path_for(id), &messages).await?;
        conversation.extend(messages);
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for JsonlStore {
    async fn get_or_create(&self, id: &str) -> Result<Arc<Conversation>, RelayError> {
        self.load(id).await
    }

    async fn messages(&self, id: &str) -> Vec<ChatMessage> {
        if let Some(conversation) = self.cache.get(id) {
            return conversation.messages();
        }
        if !fs::try_exists(self.path_for(id)).await.unwrap_or(false) {
            return Vec::new();
        }
        match self.load(id).await {
            Ok(conversation) => conversation.messages(),
            Err(err) => {
                log::warn!("failed to load conversation {id}: {err}");
                Vec::new()
            }
        }
    }

    async fn append(&self, id: &str, message: ChatMessage) -> Result<(), RelayError> {
        self.write(id, vec![message]).await
    }

    async fn append_all(&self, id: &str, messages: Vec<ChatMessage>) -> Result<(), RelayError> {
        self.write(id, messages).await
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Jsonl
    }
}

async fn read_messages(path: &Path) -> Result<Vec<ChatMessage>, RelayError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut messages = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(message) => messages.push(message),
            Err(err) => log::warn!("skipping line {} of {}: {err}", idx + 1, path.display()),
        }
    }
    Ok(messages)
}

async fn append_lines(path: &Path, messages: &[ChatMessage]) -> Result<(), RelayError> {
    let mut payload = String::new();
    for message in messages {
        payload.push_str(&serde_json::to_string(message)?);
        payload.push('\n');
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(payload.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Maps a conversation id to a file stem, percent-encoding every byte outside
/// `[A-Za-z0-9_-]` so distinct ids never share a file.
fn escape_id(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{byte:02X}");
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_id;

    #[test]
    fn escape_id_keeps_safe_characters() {
        assert_eq!(escape_id("user-42_a"), "user-42_a");
    }

    #[test]
    fn escape_id_encodes_path_separators() {
        assert_eq!(escape_id("../etc"), "%2E%2E%2Fetc");
        assert_ne!(escape_id("a/b"), escape_id("a_b"));
    }
}
