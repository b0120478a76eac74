use crate::config::Settings;
use crate::context::{ContextBuilder, HistoryFile, HistoryStore};
use crate::error::{ChatError, Result};
use crate::llm::{ChatBackend, ChatMessage, ChatRequest, StreamEvent};
use futures::StreamExt;

/// Per-session call parameters supplied by the caller.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub max_context_chars: usize,
    pub use_context: bool,
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            api_key: settings.api_key()?,
            model: settings.llm.model.clone(),
            temperature: settings.llm.temperature,
            system_prompt: settings.context.system_prompt.clone(),
            max_context_chars: settings.context.effective_max_context_chars(),
            use_context: settings.context.use_context,
        })
    }
}

/// A conversation: owns the history, builds the context for each prompt,
/// calls the backend and records both sides of the exchange.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    history: HistoryStore,
    options: SessionOptions,
    history_file: Option<HistoryFile>,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B, options: SessionOptions) -> Self {
        Self {
            backend,
            history: HistoryStore::new(),
            options,
            history_file: None,
        }
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = history;
        self
    }

    /// Load history from `file` and save back to it after every change.
    pub fn with_history_file(self, file: HistoryFile) -> Result<Self> {
        let history = file.load()?;
        Ok(self.with_history(history).persist_to(file))
    }

    /// Save to `file` after every change, keeping the history already set.
    pub fn persist_to(mut self, file: HistoryFile) -> Self {
        self.history_file = Some(file);
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }

    /// The message list that would be sent for `prompt` right now.
    pub fn messages_for(&self, prompt: &str) -> Vec<ChatMessage> {
        let builder = ContextBuilder::new()
            .with_system_prompt(self.options.system_prompt.as_str())
            .with_max_context_chars(self.options.max_context_chars);
        if self.options.use_context {
            builder.build(self.history.entries(), prompt)
        } else {
            builder.build_without_history(prompt)
        }
    }

    fn request_for(&self, prompt: &str) -> Result<ChatRequest> {
        if self.options.api_key.trim().is_empty() {
            return Err(ChatError::Config("API key is not set".into()));
        }
        Ok(ChatRequest::new(
            self.options.api_key.as_str(),
            self.options.model.as_str(),
            self.messages_for(prompt),
            self.options.temperature,
        ))
    }

    /// Ask and wait for the whole answer.
    ///
    /// The prompt is recorded before the call, the answer after it succeeds.
    pub async fn ask(&mut self, prompt: &str) -> Result<String> {
        let request = self.request_for(prompt)?;
        self.history.add_user(prompt);
        self.persist()?;

        let answer = self.backend.complete(&request).await?;

        self.history.add_assistant(answer.as_str());
        self.persist()?;
        Ok(answer)
    }

    /// Ask with a streamed answer, forwarding each delta to `on_delta`.
    ///
    /// Returns the accumulated text, which is also recorded once the stream
    /// ends, even if it ended early.
    pub async fn ask_streaming<D>(&mut self, prompt: &str, mut on_delta: D) -> Result<String>
    where
        D: FnMut(&str),
    {
        let request = self.request_for(prompt)?;
        self.history.add_user(prompt);
        self.persist()?;

        let mut events = self.backend.stream_events(&request).await?;
        let mut answer = String::new();
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Delta(delta) => {
                    on_delta(&delta);
                    answer.push_str(&delta);
                }
                StreamEvent::Done => break,
            }
        }

        self.history.add_assistant(answer.as_str());
        self.persist()?;
        Ok(answer)
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        match &self.history_file {
            Some(file) => file.save(&self.history),
            None => Ok(()),
        }
    }
}
