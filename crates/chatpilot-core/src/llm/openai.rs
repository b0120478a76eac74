use crate::constants::{context::DEFAULT_SYSTEM_PROMPT, endpoints, network};
use crate::context::{build_messages, HistoryEntry};
use crate::error::{ChatError, Result};
use crate::llm::sse::{decode_deltas, pump_deltas};
use crate::llm::traits::*;
use futures::channel::mpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the OpenAI chat-completions endpoint.
///
/// Cloning is cheap and shares the underlying connection pool. Only the
/// connect phase has a timeout, so streamed responses may stay open for as
/// long as the server keeps sending tokens.
#[derive(Clone)]
pub struct OpenAIClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(network::CONNECT_TIMEOUT_SECS))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: endpoints::OPENAI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, endpoints::CHAT_COMPLETIONS_PATH)
    }

    /// POST the request and fail on anything but a 2xx status.
    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        if request.api_key.trim().is_empty() {
            return Err(ChatError::Config("API key is not set".into()));
        }

        let body = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            stream: stream.then_some(true),
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "POST chat completions"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(request.api_key.trim())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::transport(status.as_u16(), text));
        }

        Ok(response)
    }

    /// Send a non-streaming request and return the first choice's text.
    ///
    /// A response with no choices, or a choice without content, yields an empty string.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self.send(request, false).await?;
        let text = response.text().await?;
        let parsed: OpenAIResponse = serde_json::from_str(&text)?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }

    /// Send a streaming request and push each text delta to `on_delta`.
    ///
    /// Resolves when the stream ends. Connection and status failures are
    /// returned before any callback runs; once the stream is open, `on_done`
    /// is called exactly once and later read failures only end the stream.
    pub async fn stream<D, F>(&self, request: &ChatRequest, on_delta: D, on_done: F) -> Result<()>
    where
        D: FnMut(&str),
        F: FnOnce(),
    {
        let response = self.send(request, true).await?;
        pump_deltas(response.bytes_stream(), on_delta, on_done).await;
        Ok(())
    }

    /// Channel form of [`OpenAIClient::stream`]: the read loop runs on a spawned task.
    ///
    /// Dropping the receiver stops the loop at the next delta, which drops the
    /// response body and closes the connection. `Done` is only sent when the
    /// stream itself ends.
    pub async fn stream_events(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>> {
        let response = self.send(request, true).await?;
        let (tx, rx) = mpsc::unbounded();

        let body = response.bytes_stream();
        tokio::spawn(async move {
            let deltas = decode_deltas(body);
            futures::pin_mut!(deltas);
            while let Some(delta) = deltas.next().await {
                if tx.unbounded_send(StreamEvent::Delta(delta)).is_err() {
                    tracing::debug!("Stream receiver dropped, closing response");
                    return;
                }
            }
            let _ = tx.unbounded_send(StreamEvent::Done);
        });

        Ok(rx)
    }

    // ── Convenience entry points ───────────────────────────────────────────

    /// Single prompt with the default system prompt and no history.
    pub async fn chat(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        let messages = vec![
            ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        self.complete(&ChatRequest::new(api_key, model, messages, temperature))
            .await
    }

    /// Streamed form of [`OpenAIClient::chat`].
    pub async fn chat_stream<D, F>(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        temperature: f32,
        on_delta: D,
        on_done: F,
    ) -> Result<()>
    where
        D: FnMut(&str),
        F: FnOnce(),
    {
        let messages = vec![
            ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        self.stream(
            &ChatRequest::new(api_key, model, messages, temperature),
            on_delta,
            on_done,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn chat_with_history(
        &self,
        api_key: &str,
        model: &str,
        history: &[HistoryEntry],
        prompt: &str,
        temperature: f32,
        system_prompt: &str,
        max_context_chars: usize,
    ) -> Result<String> {
        let messages = build_messages(history, prompt, system_prompt, max_context_chars);
        self.complete(&ChatRequest::new(api_key, model, messages, temperature))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn chat_stream_with_history<D, F>(
        &self,
        api_key: &str,
        model: &str,
        history: &[HistoryEntry],
        prompt: &str,
        temperature: f32,
        system_prompt: &str,
        max_context_chars: usize,
        on_delta: D,
        on_done: F,
    ) -> Result<()>
    where
        D: FnMut(&str),
        F: FnOnce(),
    {
        let messages = build_messages(history, prompt, system_prompt, max_context_chars);
        self.stream(
            &ChatRequest::new(api_key, model, messages, temperature),
            on_delta,
            on_done,
        )
        .await
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAIClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        OpenAIClient::complete(self, request).await
    }

    async fn stream_events(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>> {
        OpenAIClient::stream_events(self, request).await
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    message: Option<OpenAIMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}
