use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::{
    chat::{ChatMessage, ChunkStream, StreamChunk},
    error::RelayError,
};

use super::StreamingAgent;

#[derive(Debug, Clone)]
enum Reply {
    Fixed(Vec<StreamChunk>),
    Echo,
    Unavailable(RelayError),
}

/// Agent replaying a fixed reply, used for demos and tests.
///
/// The reply is emitted chunk by chunk, optionally spaced by a delay and
/// optionally followed by a mid-stream error.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    reply: Reply,
    delay: Option<Duration>,
    trailing_error: Option<RelayError>,
}

impl ScriptedAgent {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            trailing_error: None,
        }
    }

    /// Replies with the given chunks.
    pub fn new(chunks: Vec<StreamChunk>) -> Self {
        Self::with_reply(Reply::Fixed(chunks))
    }

    /// Replies with one text chunk per item.
    pub fn text<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            parts
                .into_iter()
                .map(|part| StreamChunk::Text(part.into()))
                .collect(),
        )
    }

    /// Replies by echoing the query back one word at a time.
    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    /// Fails every call before producing a stream.
    pub fn failing(err: RelayError) -> Self {
        Self::with_reply(Reply::Unavailable(err))
    }

    /// Waits `delay` before each chunk.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Ends the stream with `err` after the scripted chunks.
    pub fn then_fail(mut self, err: RelayError) -> Self {
        self.trailing_error = Some(err);
        self
    }

    fn chunks_for(&self, query: &str) -> Result<Vec<StreamChunk>, RelayError> {
        match &self.reply {
            Reply::Fixed(chunks) => Ok(chunks.clone()),
            Reply::Echo => Ok(echo_chunks(query)),
            Reply::Unavailable(err) => Err(err.clone()),
        }
    }
}

#[async_trait]
impl StreamingAgent for ScriptedAgent {
    async fn stream(
        &self,
        query: &str,
        _history: &[ChatMessage],
    ) -> Result<ChunkStream, RelayError> {
        let mut items: Vec<Result<StreamChunk, RelayError>> =
            self.chunks_for(query)?.into_iter().map(Ok).collect();
        if let Some(err) = &self.trailing_error {
            items.push(Err(err.clone()));
        }

        let Some(delay) = self.delay else {
            return Ok(Box::pin(stream::iter(items)));
        };
        Ok(Box::pin(stream::iter(items).then(move |item| async move {
            tokio::time::sleep(delay).await;
            item
        })))
    }
}

fn echo_chunks(query: &str) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = query
        .split_inclusive(' ')
        .map(|word| StreamChunk::Text(word.to_string()))
        .collect();
    chunks.push(StreamChunk::Text("\n".to_string()));
    chunks.push(StreamChunk::Done {
        stop_reason: "end_turn".to_string(),
    });
    chunks
}
