#[path = "handlers/chat.rs"]
mod chat;

#[path = "handlers/helpers.rs"]
mod helpers;

pub use chat::{agent_page, handle_chat, redirect_to_agent, ChatQuery};
