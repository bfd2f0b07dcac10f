mod logged;
mod scripted;
mod traits;

pub use logged::LoggedAgent;
pub use scripted::ScriptedAgent;
pub use traits::StreamingAgent;
