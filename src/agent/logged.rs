use async_trait::async_trait;
use futures::StreamExt;

use crate::{
    chat::{ChatMessage, ChunkStream},
    error::RelayError,
};

use super::StreamingAgent;

/// Wrapper that logs every agent call and any mid-stream failure.
pub struct LoggedAgent {
    inner: Box<dyn StreamingAgent>,
    name: String,
}

impl LoggedAgent {
    pub fn new(inner: Box<dyn StreamingAgent>, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }
}

#[async_trait]
impl StreamingAgent for LoggedAgent {
    async fn stream(
        &self,
        query: &str,
        history: &[ChatMessage],
    ) -> Result<ChunkStream, RelayError> {
        log::debug!(
            "[{}] stream call with {} history messages, query of {} chars",
            self.name,
            history.len(),
            query.chars().count()
        );
        let stream = match self.inner.stream(query, history).await {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("[{}] stream call failed: {err}", self.name);
                return Err(err);
            }
        };
        log::debug!("[{}] stream opened", self.name);

        let name = self.name.clone();
        Ok(Box::pin(stream.inspect(move |item| {
            if let Err(err) = item {
                log::warn!("[{name}] stream failed mid-response: {err}");
            }
        })))
    }
}
