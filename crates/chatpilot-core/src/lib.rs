pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod config;
pub mod session;

// Re-export key types
pub use error::ChatError;
pub use llm::{ChatBackend, ChatMessage, ChatRequest, OpenAIClient, Role, StreamEvent};
pub use context::{build_messages, ContextBuilder, HistoryEntry, HistoryFile, HistoryStore};
pub use config::Settings;
pub use session::{ChatSession, SessionOptions};
