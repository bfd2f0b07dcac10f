mod message;
mod stream;
mod tool;

pub use message::{ChatMessage, ChatMessageBuilder, ChatRole, MessageType};
pub use stream::{ChunkStream, StreamChunk};
pub use tool::{FunctionCall, ToolCall};
