mod history;
mod builder;
pub mod persistence;

pub use history::{HistoryEntry, HistoryStore};
pub use builder::{build_messages, build_messages_without_history, effective_system_prompt, ContextBuilder};
pub use persistence::{HistoryFile, PersistedState};
