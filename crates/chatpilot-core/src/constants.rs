/// Chatpilot — centralized constants.
/// Limits, defaults and endpoints shared by the core and the CLI.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
    pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
}

// ─── Context window ───────────────────────────────────────────────────────────

pub mod context {
    /// Used whenever the configured system prompt is blank.
    pub const DEFAULT_SYSTEM_PROMPT: &str =
        "Responde em português de Portugal e trata o utilizador por tu.";

    /// Floor applied to every character budget.
    pub const MIN_CONTEXT_CHARS: usize = 1000;
    pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;

    /// Entries kept in the persisted history before FIFO eviction.
    pub const MAX_HISTORY: usize = 200;
}

// ─── Streaming protocol ───────────────────────────────────────────────────────

pub mod sse {
    pub const DATA_PREFIX: &str = "data:";
    pub const DONE_SENTINEL: &str = "[DONE]";
}

// ─── Network ──────────────────────────────────────────────────────────────────

pub mod network {
    /// Only the connect phase is bounded; streams may stay open indefinitely.
    pub const CONNECT_TIMEOUT_SECS: u64 = 20;
    pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
}

// ─── Persistence ──────────────────────────────────────────────────────────────

pub mod storage {
    pub const APP_DIR: &str = "chatpilot";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const HISTORY_FILE: &str = "history.json";
    pub const HISTORY_SCHEMA_VERSION: u32 = 1;
}
