use crate::constants::context::{DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_SYSTEM_PROMPT, MIN_CONTEXT_CHARS};
use crate::context::HistoryEntry;
use crate::llm::{ChatMessage, Role};

/// Builds the outgoing message list: one system message, as much recent
/// history as fits the character budget, then the new user prompt.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    max_context_chars: usize,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    /// A blank prompt falls back to the default one.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = effective_system_prompt(&prompt.into());
        self
    }

    /// Budgets below the floor are raised to it.
    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max.max(MIN_CONTEXT_CHARS);
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    pub fn build(&self, history: &[HistoryEntry], user_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];

        // The system prompt counts against the budget; the new prompt never does.
        let mut total = self.system_prompt.chars().count();
        let mut included = Vec::new();
        for entry in history.iter().rev() {
            let len = entry.char_len();
            if total + len > self.max_context_chars {
                break;
            }
            total += len;
            included.push(history_message(entry));
        }
        included.reverse();
        messages.extend(included);

        messages.push(ChatMessage::user(user_prompt));
        messages
    }

    pub fn build_without_history(&self, user_prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(user_prompt),
        ]
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the message list for `user_prompt` from `history` within `max_context_chars`.
pub fn build_messages(
    history: &[HistoryEntry],
    user_prompt: &str,
    system_prompt: &str,
    max_context_chars: usize,
) -> Vec<ChatMessage> {
    ContextBuilder::new()
        .with_system_prompt(system_prompt)
        .with_max_context_chars(max_context_chars)
        .build(history, user_prompt)
}

/// `[system, user]` with no history at all.
pub fn build_messages_without_history(user_prompt: &str, system_prompt: &str) -> Vec<ChatMessage> {
    ContextBuilder::new()
        .with_system_prompt(system_prompt)
        .build_without_history(user_prompt)
}

pub fn effective_system_prompt(prompt: &str) -> String {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        DEFAULT_SYSTEM_PROMPT.to_string()
    } else {
        prompt.to_string()
    }
}

// Stored system entries are resent as user turns.
fn history_message(entry: &HistoryEntry) -> ChatMessage {
    match entry.role {
        Role::Assistant => ChatMessage::assistant(&entry.text),
        Role::User | Role::System => ChatMessage::user(&entry.text),
    }
}
