use crate::error::ChatError;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Lenient parse for stored roles: case-insensitive, unknown values become `User`.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("assistant") {
            Role::Assistant
        } else if raw.eq_ignore_ascii_case("system") {
            Role::System
        } else {
            Role::User
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Role::parse_lenient).unwrap_or(Role::User))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of the message array sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Per-call arguments shared by the completion and streaming contracts.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            messages,
            temperature,
        }
    }
}

/// Events emitted on the channel form of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    /// Sent exactly once, after the last delta.
    Done,
}

/// The seam between a chat session and the upstream API.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and wait for the full response text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Open a streamed response. Errors are returned only if the stream could not be opened.
    async fn stream_events(
        &self,
        request: &ChatRequest,
    ) -> Result<futures::channel::mpsc::UnboundedReceiver<StreamEvent>, ChatError>;
}
