pub mod in_memory;
pub mod jsonl;
mod conversation;
mod types;

pub use conversation::Conversation;
pub use in_memory::InMemoryStore;
pub use jsonl::JsonlStore;
pub use types::{ConversationStore, StoreKind};

#[cfg(test)]
mod tests;
