use async_trait::async_trait;

use crate::{
    chat::{ChatMessage, ChunkStream},
    error::RelayError,
};

/// The model/agent collaborator driven by the relay.
///
/// Prompt construction, tool binding and model selection happen behind this
/// trait; the relay only sees the resulting chunk stream.
#[async_trait]
pub trait StreamingAgent: Send + Sync {
    /// Starts a streamed reply to `query` given the prior `history`.
    ///
    /// An `Err` means nothing was produced. Errors inside the returned stream
    /// are mid-stream failures.
    async fn stream(&self, query: &str, history: &[ChatMessage])
        -> Result<ChunkStream, RelayError>;
}

#[async_trait]
impl<T: StreamingAgent + ?Sized> StreamingAgent for std::sync::Arc<T> {
    async fn stream(
        &self,
        query: &str,
        history: &[ChatMessage],
    ) -> Result<ChunkStream, RelayError> {
        (**self).stream(query, history).await
    }
}
