use crate::constants::storage::{APP_DIR, HISTORY_FILE, HISTORY_SCHEMA_VERSION};
use crate::context::{HistoryEntry, HistoryStore};
use crate::error::ChatError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk shape of the application state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

fn default_schema_version() -> u32 {
    HISTORY_SCHEMA_VERSION
}

/// Loads and saves the conversation history as JSON.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    /// History file in the default data directory (`<data_dir>/chatpilot/history.json`).
    pub fn new() -> Result<Self, ChatError> {
        let dir = dirs::data_dir().ok_or_else(|| {
            ChatError::Config("Could not determine data directory".to_string())
        })?;
        Ok(Self::with_path(dir.join(APP_DIR).join(HISTORY_FILE)))
    }

    /// History file at a custom location (useful for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored history. A missing file is an empty history.
    pub fn load(&self) -> Result<HistoryStore, ChatError> {
        if !self.path.exists() {
            return Ok(HistoryStore::new());
        }

        let contents = fs::read_to_string(&self.path)?;

        let state: PersistedState = serde_json::from_str(&contents).map_err(|e| {
            ChatError::Config(format!("Failed to parse history file: {}", e))
        })?;

        if state.schema_version != HISTORY_SCHEMA_VERSION {
            tracing::warn!(
                "History file schema version {} differs from {}, loading anyway",
                state.schema_version,
                HISTORY_SCHEMA_VERSION
            );
        }

        Ok(HistoryStore::from_entries(state.history))
    }

    /// Like [`HistoryFile::load`], but an unreadable or corrupt file yields an
    /// empty history with a warning. The next save replaces the bad file.
    pub fn load_or_empty(&self) -> HistoryStore {
        self.load().unwrap_or_else(|e| {
            tracing::warn!("Ignoring history at {}: {}", self.path.display(), e);
            HistoryStore::new()
        })
    }

    /// Write the history atomically (temp file, then rename).
    pub fn save(&self, history: &HistoryStore) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let state = PersistedState {
            schema_version: HISTORY_SCHEMA_VERSION,
            history: history.entries().to_vec(),
        };
        let contents = serde_json::to_string_pretty(&state)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::info!("Saved {} history entries to {}", history.len(), self.path.display());
        Ok(())
    }
}
