//! Fan-out of a single agent chunk stream.
//!
//! [`tee`] splits the stream into independent [`StreamHandle`]s. One handle
//! feeds a [`BufferedEmitter`] that batches text for the client, another feeds
//! an [`Aggregator`] that commits the finished turn to conversation history.

pub mod aggregator;
pub mod emitter;
pub mod tee;

pub use aggregator::{concat_chunks, Aggregator};
pub use emitter::{BufferedEmitter, ChannelSink, EmitterConfig, EventSink, FlushEvent};
pub use tee::{tee, StreamHandle};

use crate::error::RelayError;

/// How a consumer branch of the tee finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch consumed the stream to its end
    Completed,
    /// The cancellation token fired first
    Cancelled,
    /// The branch stopped on an error local to it
    Failed(RelayError),
}

impl BranchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, BranchOutcome::Completed)
    }

    pub fn error(&self) -> Option<&RelayError> {
        match self {
            BranchOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}
