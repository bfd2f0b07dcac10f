//! Per-request orchestration of the streaming pipeline.

mod orchestrator;
mod request;
mod state;

pub use orchestrator::{Pipeline, PipelineRun, ResponseStream, DEFAULT_EVENT_BUFFER};
pub use request::ChatRequest;
pub use state::PipelineState;
