use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{context, endpoints, models, network, storage};
use crate::context::effective_system_prompt;
use crate::error::ChatError;
use crate::llm::OpenAIClient;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub context: ContextSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub connect_timeout_secs: u64,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextSettings {
    /// Resend prior conversation with each prompt.
    pub use_context: bool,
    pub max_context_chars: usize,
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: models::DEFAULT_OPENAI_MODEL.to_string(),
            temperature: models::DEFAULT_TEMPERATURE,
            api_key_env: network::API_KEY_ENV.to_string(),
            base_url: None,
            connect_timeout_secs: network::CONNECT_TIMEOUT_SECS,
            stream: true,
        }
    }
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            use_context: true,
            max_context_chars: context::DEFAULT_MAX_CONTEXT_CHARS,
            system_prompt: context::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ContextSettings {
    pub fn set_max_context_chars(&mut self, max: usize) {
        self.max_context_chars = max.max(context::MIN_CONTEXT_CHARS);
    }

    pub fn set_system_prompt(&mut self, prompt: &str) {
        self.system_prompt = effective_system_prompt(prompt);
    }

    /// Budget with the floor applied, whatever the file said.
    pub fn effective_max_context_chars(&self) -> usize {
        self.max_context_chars.max(context::MIN_CONTEXT_CHARS)
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(storage::APP_DIR)
            .join(storage::CONFIG_FILE)
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read settings from `path`, falling back to defaults if it is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring invalid config {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Could not read config {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), ChatError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ChatError> {
        toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Get the API key from the environment variable named in settings.
    pub fn api_key(&self) -> Result<String, ChatError> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ChatError::Config(format!(
                    "API key not set: export {} first",
                    self.llm.api_key_env
                ))
            })
    }

    pub fn base_url(&self) -> &str {
        self.llm
            .base_url
            .as_deref()
            .unwrap_or(endpoints::OPENAI_BASE_URL)
    }

    /// Build the HTTP client from the current settings.
    pub fn build_client(&self) -> Result<OpenAIClient, ChatError> {
        let client =
            OpenAIClient::with_connect_timeout(Duration::from_secs(self.llm.connect_timeout_secs))?;
        Ok(client.with_base_url(self.base_url()))
    }
}
