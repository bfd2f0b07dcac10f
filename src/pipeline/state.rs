use std::fmt;

use crate::{error::RelayError, stream::BranchOutcome};

/// Lifecycle of one pipeline invocation.
///
/// `Idle → Dispatched → Streaming → {Completed, Cancelled, Failed}`; an agent
/// error moves `Dispatched` straight to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Dispatched,
    Streaming,
    Completed,
    Cancelled,
    Failed(RelayError),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed(_)
        )
    }

    /// Terminal state implied by the outcomes of both branches.
    ///
    /// A client-side failure wins over a history-side one, and any failure
    /// wins over cancellation.
    pub fn from_branches(emitter: &BranchOutcome, aggregator: &BranchOutcome) -> Self {
        match (emitter, aggregator) {
            (BranchOutcome::Failed(err), _) | (_, BranchOutcome::Failed(err)) => {
                PipelineState::Failed(err.clone())
            }
            (BranchOutcome::Cancelled, _) | (_, BranchOutcome::Cancelled) => {
                PipelineState::Cancelled
            }
            (BranchOutcome::Completed, BranchOutcome::Completed) => PipelineState::Completed,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Dispatched => write!(f, "dispatched"),
            PipelineState::Streaming => write!(f, "streaming"),
            PipelineState::Completed => write!(f, "completed"),
            PipelineState::Cancelled => write!(f, "cancelled"),
            PipelineState::Failed(err) => write!(f, "failed ({err})"),
        }
    }
}
