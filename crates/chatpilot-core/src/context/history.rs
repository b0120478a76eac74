use crate::constants::context::MAX_HISTORY;
use crate::llm::Role;
use serde::{Deserialize, Deserializer, Serialize};

/// One past message as it is kept in the persisted history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Ordered, size-capped conversation log.
///
/// Appending beyond the cap drops the oldest entries first; the order of the
/// remaining entries never changes.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: MAX_HISTORY,
        }
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self.trim_if_needed();
        self
    }

    /// Rebuild a store from loaded entries, keeping only the newest `MAX_HISTORY`.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut store = Self {
            entries,
            max_entries: MAX_HISTORY,
        };
        store.trim_if_needed();
        store
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.push(HistoryEntry::user(text));
    }

    pub fn add_assistant(&mut self, text: impl Into<String>) {
        self.push(HistoryEntry::assistant(text));
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        self.trim_if_needed();
    }

    /// Entries in insertion order, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn trim_if_needed(&mut self) {
        if self.entries.len() > self.max_entries {
            let drop = self.entries.len() - self.max_entries;
            self.entries.drain(..drop);
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
