use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::stream::Stream;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    agent::StreamingAgent,
    error::RelayError,
    memory::ConversationStore,
    stream::{
        tee, Aggregator, BranchOutcome, BufferedEmitter, ChannelSink, EmitterConfig, EventSink,
        FlushEvent,
    },
};

use super::{ChatRequest, PipelineState};

/// Capacity of the event channel behind [`Pipeline::stream`].
pub const DEFAULT_EVENT_BUFFER: usize = 32;

/// Entry point wiring an agent stream into the client and the history store.
///
/// A `Pipeline` holds only shared collaborators; every call to [`run`] or
/// [`stream`] is an independent invocation.
///
/// [`run`]: Pipeline::run
/// [`stream`]: Pipeline::stream
#[derive(Clone)]
pub struct Pipeline {
    agent: Arc<dyn StreamingAgent>,
    store: Arc<dyn ConversationStore>,
    emitter: EmitterConfig,
    event_buffer: usize,
}

impl Pipeline {
    pub fn new(agent: Arc<dyn StreamingAgent>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            agent,
            store,
            emitter: EmitterConfig::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn emitter_config(mut self, config: EmitterConfig) -> Self {
        self.emitter = config;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Dispatches `request` and starts both branches, flushing into `sink`.
    ///
    /// Returns as soon as streaming has started. An error means the request
    /// was invalid or the agent call failed, and nothing was spawned.
    pub async fn run<S>(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
        sink: S,
    ) -> Result<PipelineRun, RelayError>
    where
        S: EventSink + 'static,
    {
        request.validate()?;
        let ChatRequest {
            conversation_id,
            query,
        } = request;
        let mut tracker = StateTracker::new(&conversation_id);

        // Read-only: the conversation is created when the finished turn is saved.
        let history = self.store.messages(&conversation_id).await;
        tracker.advance(PipelineState::Dispatched);

        let source = match self.agent.stream(&query, &history).await {
            Ok(source) => source,
            Err(err) => {
                let err = dispatch_error(err);
                tracker.advance(PipelineState::Failed(err.clone()));
                return Err(err);
            }
        };

        let mut branches = tee(source, 2).into_iter();
        let (Some(history_branch), Some(client_branch)) = (branches.next(), branches.next())
        else {
            return Err(RelayError::Generic(
                "tee returned fewer branches than requested".to_string(),
            ));
        };

        let aggregator = Aggregator::new(Arc::clone(&self.store), conversation_id.clone(), query);
        let aggregator = tokio::spawn(aggregator.run(history_branch, cancel.clone()));
        let emitter = BufferedEmitter::new(self.emitter.clone(), sink);
        let emitter = tokio::spawn(emitter.run(client_branch, cancel));
        tracker.advance(PipelineState::Streaming);

        Ok(PipelineRun {
            conversation_id,
            emitter,
            aggregator,
        })
    }

    /// Like [`run`](Pipeline::run), flushing into a channel returned to the caller.
    pub async fn stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ResponseStream, RelayError> {
        let (sink, events) = ChannelSink::channel(self.event_buffer);
        let run = self.run(request, cancel, sink).await?;
        Ok(ResponseStream { events, run })
    }
}

fn dispatch_error(err: RelayError) -> RelayError {
    match err {
        RelayError::Dispatch(_) => err,
        other => RelayError::Dispatch(other.to_string()),
    }
}

struct StateTracker<'a> {
    conversation_id: &'a str,
    state: PipelineState,
}

impl<'a> StateTracker<'a> {
    fn new(conversation_id: &'a str) -> Self {
        Self {
            conversation_id,
            state: PipelineState::Idle,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        log::debug!(
            "conversation {}: {} -> {next}",
            self.conversation_id,
            self.state
        );
        self.state = next;
    }
}

/// Handles on the two running branches of one invocation.
///
/// Dropping a `PipelineRun` detaches the branches; they still wind down on
/// their own through end of stream or the cancellation token.
#[derive(Debug)]
pub struct PipelineRun {
    conversation_id: String,
    emitter: JoinHandle<BranchOutcome>,
    aggregator: JoinHandle<BranchOutcome>,
}

impl PipelineRun {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_finished(&self) -> bool {
        self.emitter.is_finished() && self.aggregator.is_finished()
    }

    /// Waits for both branches and returns the terminal state.
    pub async fn finish(self) -> PipelineState {
        let emitter = join_branch(self.emitter, "emitter").await;
        let aggregator = join_branch(self.aggregator, "aggregator").await;
        let state = PipelineState::from_branches(&emitter, &aggregator);
        match &state {
            PipelineState::Failed(err) => {
                log::warn!("conversation {}: pipeline failed: {err}", self.conversation_id);
            }
            other => {
                log::debug!("conversation {}: streaming -> {other}", self.conversation_id);
            }
        }
        state
    }
}

async fn join_branch(handle: JoinHandle<BranchOutcome>, branch: &str) -> BranchOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(err) => BranchOutcome::Failed(RelayError::Generic(format!(
            "{branch} task ended abnormally: {err}"
        ))),
    }
}

/// Flush events of one invocation, readable as a [`Stream`].
///
/// The stream ends after `FlushEvent::End` or `FlushEvent::Error`, or when
/// the emitter stops. Dropping it makes the next flush fail with a transport
/// error, which stops the emitter but leaves history accumulation running.
#[derive(Debug)]
pub struct ResponseStream {
    events: mpsc::Receiver<FlushEvent>,
    run: PipelineRun,
}

impl ResponseStream {
    pub async fn recv(&mut self) -> Option<FlushEvent> {
        self.events.recv().await
    }

    pub fn conversation_id(&self) -> &str {
        self.run.conversation_id()
    }

    pub fn into_parts(self) -> (mpsc::Receiver<FlushEvent>, PipelineRun) {
        (self.events, self.run)
    }

    /// Discards any remaining events and returns the terminal state.
    pub async fn finish(mut self) -> PipelineState {
        while self.events.recv().await.is_some() {}
        self.run.finish().await
    }
}

impl Stream for ResponseStream {
    type Item = FlushEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}
