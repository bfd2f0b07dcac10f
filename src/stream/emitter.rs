use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;

use super::{BranchOutcome, StreamHandle};

pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MAX_BUFFER_CHARS: usize = 200;
pub const DEFAULT_TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

/// Flush policy of a [`BufferedEmitter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Interval of the periodic flush, in milliseconds
    pub flush_interval_ms: u64,
    /// Buffered characters above which a chunk triggers an immediate flush
    pub max_buffer_chars: usize,
    /// A chunk ending with one of these characters triggers an immediate flush
    pub terminators: Vec<char>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            max_buffer_chars: DEFAULT_MAX_BUFFER_CHARS,
            terminators: DEFAULT_TERMINATORS.to_vec(),
        }
    }
}

impl EmitterConfig {
    pub fn flush_interval(&self) -> Duration {
        if self.flush_interval_ms == 0 {
            log::warn!("flush interval must be greater than 0, using {DEFAULT_FLUSH_INTERVAL_MS}ms");
            return Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS);
        }
        Duration::from_millis(self.flush_interval_ms)
    }

    fn ends_sentence(&self, text: &str) -> bool {
        text.chars()
            .next_back()
            .is_some_and(|last| self.terminators.contains(&last))
    }
}

/// One delivery to the client transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushEvent {
    /// A non-empty fragment of response text
    Text(String),
    /// The response ended normally
    End,
    /// The response ended because the upstream stream failed
    Error(String),
}

/// Destination of flush events, typically a client connection.
#[async_trait]
pub trait EventSink: Send {
    async fn publish(&mut self, event: FlushEvent) -> Result<(), RelayError>;

    /// Delivers `event` only if the sink can take it without waiting.
    ///
    /// Used for the final events after cancellation. Sinks that cannot
    /// deliver without waiting keep the default, which drops the event.
    fn try_publish(&mut self, _event: FlushEvent) -> Result<(), RelayError> {
        Err(RelayError::Transport(
            "sink cannot deliver without waiting".to_string(),
        ))
    }
}

/// Sink forwarding events into a bounded channel.
///
/// Publishing fails once the receiving side has been dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<FlushEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<FlushEvent>) -> Self {
        Self { sender }
    }

    /// Creates a sink together with the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FlushEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&mut self, event: FlushEvent) -> Result<(), RelayError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| RelayError::Transport("client disconnected".to_string()))
    }

    fn try_publish(&mut self, event: FlushEvent) -> Result<(), RelayError> {
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => RelayError::Transport("client is not reading".to_string()),
            TrySendError::Closed(_) => RelayError::Transport("client disconnected".to_string()),
        })
    }
}

/// Why a flush did not complete.
enum Halt {
    /// The cancellation token fired while waiting on the sink
    Cancelled,
    Failed(RelayError),
}

/// Batches chunk text from one tee branch into flush events.
pub struct BufferedEmitter<S> {
    config: EmitterConfig,
    sink: S,
    buffer: String,
    buffered_chars: usize,
    flushes: usize,
}

impl<S: EventSink> BufferedEmitter<S> {
    pub fn new(config: EmitterConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            buffer: String::new(),
            buffered_chars: 0,
            flushes: 0,
        }
    }

    /// Consumes `handle` until end of stream, cancellation, or failure.
    ///
    /// Triggers are checked in order: cancellation, flush timer, then the
    /// size and sentence rules on each received chunk. Every wait on the sink
    /// is raced against `cancel`, so a client that stops reading never keeps
    /// the emitter alive past cancellation.
    pub async fn run(mut self, mut handle: StreamHandle, cancel: CancellationToken) -> BranchOutcome {
        let interval = self.config.flush_interval();
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Halt::Cancelled),
                _ = ticker.tick() => self.flush(&cancel).await.map(|()| None),
                item = handle.recv() => match item {
                    Some(Ok(chunk)) => match chunk.text() {
                        Some(text) => self.push(text, &cancel).await.map(|()| None),
                        None => Ok(None),
                    },
                    Some(Err(err)) => self.finish_failed(err, &cancel).await.map(Some),
                    None => self
                        .finish_completed(&cancel)
                        .await
                        .map(|()| Some(BranchOutcome::Completed)),
                },
            };
            match step {
                Ok(None) => {}
                Ok(Some(outcome)) => break outcome,
                Err(Halt::Cancelled) => {
                    handle.close();
                    self.finish_cancelled();
                    break BranchOutcome::Cancelled;
                }
                Err(Halt::Failed(err)) => {
                    handle.close();
                    break BranchOutcome::Failed(err);
                }
            }
        };
        log::debug!(
            "emitter stopped after {} flushes: {outcome:?}",
            self.flushes
        );
        outcome
    }

    async fn push(&mut self, text: &str, cancel: &CancellationToken) -> Result<(), Halt> {
        if text.is_empty() {
            return Ok(());
        }
        self.buffer.push_str(text);
        self.buffered_chars += text.chars().count();
        if self.buffered_chars > self.config.max_buffer_chars || self.config.ends_sentence(text) {
            self.flush(cancel).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, cancel: &CancellationToken) -> Result<(), Halt> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.buffer);
        let chars = std::mem::take(&mut self.buffered_chars);
        match self.publish(FlushEvent::Text(text.clone()), cancel).await {
            Ok(()) => {
                self.flushes += 1;
                Ok(())
            }
            Err(Halt::Cancelled) => {
                // Dropping a pending send delivers nothing; keep the text for the final flush.
                self.buffer = text;
                self.buffered_chars = chars;
                Err(Halt::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    async fn publish(&mut self, event: FlushEvent, cancel: &CancellationToken) -> Result<(), Halt> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Halt::Cancelled),
            result = self.sink.publish(event) => result.map_err(|err| Halt::Failed(transport(err))),
        }
    }

    async fn finish_completed(&mut self, cancel: &CancellationToken) -> Result<(), Halt> {
        self.flush(cancel).await?;
        self.publish(FlushEvent::End, cancel).await
    }

    /// Flushes what was received, then reports the upstream error.
    async fn finish_failed(
        &mut self,
        err: RelayError,
        cancel: &CancellationToken,
    ) -> Result<BranchOutcome, Halt> {
        let err = RelayError::upstream(err);
        self.flush(cancel).await?;
        match self.publish(FlushEvent::Error(err.to_string()), cancel).await {
            Err(Halt::Cancelled) => return Err(Halt::Cancelled),
            Err(Halt::Failed(transport)) => {
                log::debug!("error event could not be delivered: {transport}");
            }
            Ok(()) => {}
        }
        Ok(BranchOutcome::Failed(err))
    }

    /// Best-effort final flush and `End` that never wait on the sink.
    fn finish_cancelled(&mut self) {
        if !self.buffer.is_empty() {
            let text = std::mem::take(&mut self.buffer);
            self.buffered_chars = 0;
            if let Err(err) = self.sink.try_publish(FlushEvent::Text(text)) {
                log::debug!("final flush after cancellation dropped: {err}");
                return;
            }
            self.flushes += 1;
        }
        if let Err(err) = self.sink.try_publish(FlushEvent::End) {
            log::debug!("end event after cancellation dropped: {err}");
        }
    }
}

fn transport(err: RelayError) -> RelayError {
    match err {
        RelayError::Transport(_) => err,
        other => RelayError::Transport(other.to_string()),
    }
}

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;
