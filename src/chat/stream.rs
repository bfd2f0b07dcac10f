use std::pin::Pin;

use futures::stream::Stream;

use crate::error::RelayError;

use super::tool::ToolCall;

/// Boxed chunk stream handed to the relay by an agent call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, RelayError>> + Send>>;

/// A streaming chunk that can be either text or a tool call event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),

    /// Tool use block started (contains tool id and name)
    ToolUseStart {
        /// The index of this content block in the response
        index: usize,
        /// The unique ID for this tool use
        id: String,
        /// The name of the tool being called
        name: String,
    },

    /// Tool use input JSON delta (partial JSON string)
    ToolUseInputDelta {
        /// The index of this content block
        index: usize,
        /// Partial JSON string for the tool input
        partial_json: String,
    },

    /// Tool use block complete with assembled ToolCall
    ToolUseComplete {
        /// The index of this content block
        index: usize,
        /// The complete tool call with id, name, and parsed arguments
        tool_call: ToolCall,
    },

    /// Stream ended with stop reason
    Done {
        /// The reason the stream stopped (e.g., "end_turn", "tool_use")
        stop_reason: String,
    },
}

impl StreamChunk {
    /// Incremental text carried by this chunk, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamChunk::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether this chunk marks the end of the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::StreamChunk;

    #[test]
    fn only_text_chunks_carry_text() {
        assert_eq!(StreamChunk::Text("hi".into()).text(), Some("hi"));
        let done = StreamChunk::Done {
            stop_reason: "end_turn".into(),
        };
        assert_eq!(done.text(), None);
        assert!(done.is_terminal());
    }
}
