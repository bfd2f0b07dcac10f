//! Streaming response pipeline for LLM chat agents.
//!
//! A single agent response stream is split with [`stream::tee`] into two
//! branches: one is batched into client-facing flushes by a
//! [`stream::BufferedEmitter`], the other is accumulated by a
//! [`stream::Aggregator`] into conversation history once the turn completes.
//! [`Pipeline`] wires both together per request.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use llm_relay::{
//!     agent::ScriptedAgent, memory::InMemoryStore, ChatRequest, FlushEvent, Pipeline,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), llm_relay::RelayError> {
//! let pipeline = Pipeline::new(
//!     Arc::new(ScriptedAgent::echo()),
//!     Arc::new(InMemoryStore::new()),
//! );
//! let mut response = pipeline
//!     .stream(ChatRequest::new("u1", "hello there"), CancellationToken::new())
//!     .await?;
//! while let Some(event) = response.recv().await {
//!     if let FlushEvent::Text(text) = event {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod stream;

#[cfg(feature = "api")]
pub mod api;

pub use agent::StreamingAgent;
pub use config::RelayConfig;
pub use error::RelayError;
pub use memory::{ConversationStore, InMemoryStore, JsonlStore};
pub use pipeline::{ChatRequest, Pipeline, PipelineState};
pub use stream::{EmitterConfig, FlushEvent};
