//! Session State
//!
//! Process-wide agent session: provider selection, toggles, memory, the
//! processing flag and the capped command history. Everything except the
//! processing flag is persisted under one storage key; the action log has
//! its own key.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use taskpilot_llm::{ChatMessage, ProviderType};
use taskpilot_tools::ActionLogEntry;
use uuid::Uuid;

use crate::models::session::{
    CommandHistoryEntry, MemoryEntry, PersistedSession, SessionToggles, TogglesUpdate,
};
use crate::storage::KeyValueStore;
use crate::utils::error::AppResult;

/// Storage key of the session.
pub const SESSION_KEY: &str = "taskpilot.agent.session";
/// Storage key of the action log.
pub const ACTION_LOG_KEY: &str = "taskpilot.agent.action_log";
/// Maximum remembered facts.
pub const MEMORY_LIMIT: usize = 20;

#[derive(Debug, Default)]
struct SessionData {
    persisted: PersistedSession,
    processing: bool,
    last_error: Option<String>,
}

pub struct SessionState {
    session_id: String,
    history_limit: usize,
    storage: Arc<dyn KeyValueStore>,
    data: RwLock<SessionData>,
}

impl SessionState {
    /// Load the session from storage.
    ///
    /// A missing or unreadable payload yields a fresh session; the problem
    /// is logged, not returned.
    pub fn load(storage: Arc<dyn KeyValueStore>, history_limit: usize) -> Self {
        let mut persisted: PersistedSession = read_json(storage.as_ref(), SESSION_KEY)
            .unwrap_or_default();
        persisted.history.truncate(history_limit.max(1));
        let start = persisted.memory.len().saturating_sub(MEMORY_LIMIT);
        persisted.memory.drain(..start);

        let session_id = Uuid::new_v4().to_string();
        tracing::info!(
            session_id = %session_id,
            history = persisted.history.len(),
            "session loaded"
        );
        Self {
            session_id,
            history_limit: history_limit.max(1),
            storage,
            data: RwLock::new(SessionData {
                persisted,
                ..Default::default()
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Write the session to storage.
    pub fn persist(&self) -> AppResult<()> {
        let payload = {
            let data = self.data.read().unwrap_or_else(|e| e.into_inner());
            serde_json::to_string(&data.persisted)?
        };
        self.storage.set(SESSION_KEY, &payload)
    }

    /// Persist, logging instead of failing.
    pub fn persist_quietly(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    pub fn save_action_log(&self, entries: &[ActionLogEntry]) -> AppResult<()> {
        let payload = serde_json::to_string(entries)?;
        self.storage.set(ACTION_LOG_KEY, &payload)
    }

    /// Persisted action log, empty when missing or unreadable.
    pub fn load_action_log(&self) -> Vec<ActionLogEntry> {
        read_json(self.storage.as_ref(), ACTION_LOG_KEY).unwrap_or_default()
    }

    // ── Provider ───────────────────────────────────────────────────────

    pub fn active_provider(&self) -> Option<ProviderType> {
        self.read(|d| d.persisted.active_provider)
    }

    pub fn set_active_provider(&self, provider: Option<ProviderType>) {
        self.write(|d| d.persisted.active_provider = provider);
        self.persist_quietly();
    }

    // ── Toggles ────────────────────────────────────────────────────────

    pub fn toggles(&self) -> SessionToggles {
        self.read(|d| d.persisted.toggles)
    }

    pub fn update_toggles(&self, update: TogglesUpdate) -> SessionToggles {
        let toggles = self.write(|d| {
            d.persisted.toggles.apply_update(update);
            d.persisted.toggles
        });
        self.persist_quietly();
        toggles
    }

    // ── Processing flag ────────────────────────────────────────────────

    /// Mark a command as running and clear the previous error.
    pub fn begin_processing(&self) {
        self.write(|d| {
            d.processing = true;
            d.last_error = None;
        });
    }

    pub fn finish_processing(&self, error: Option<String>) {
        self.write(|d| {
            d.processing = false;
            d.last_error = error;
        });
    }

    pub fn is_processing(&self) -> bool {
        self.read(|d| d.processing)
    }

    pub fn last_error(&self) -> Option<String> {
        self.read(|d| d.last_error.clone())
    }

    // ── Memory ─────────────────────────────────────────────────────────

    /// Remember a fact. Re-remembering a key moves it to the newest slot;
    /// the oldest fact is dropped past the limit.
    pub fn remember(&self, key: &str, value: &str) {
        let key = key.trim().to_string();
        if key.is_empty() {
            return;
        }
        self.write(|d| {
            let memory = &mut d.persisted.memory;
            memory.retain(|m| m.key != key);
            memory.push(MemoryEntry {
                key,
                value: value.trim().to_string(),
            });
            if memory.len() > MEMORY_LIMIT {
                let excess = memory.len() - MEMORY_LIMIT;
                memory.drain(..excess);
            }
        });
        self.persist_quietly();
    }

    pub fn forget(&self, key: &str) -> bool {
        let removed = self.write(|d| {
            let before = d.persisted.memory.len();
            d.persisted.memory.retain(|m| m.key != key.trim());
            d.persisted.memory.len() != before
        });
        if removed {
            self.persist_quietly();
        }
        removed
    }

    pub fn memory(&self) -> BTreeMap<String, String> {
        self.read(|d| {
            d.persisted
                .memory
                .iter()
                .map(|m| (m.key.clone(), m.value.clone()))
                .collect()
        })
    }

    // ── History ────────────────────────────────────────────────────────

    /// Prepend an entry, dropping the oldest past the limit.
    pub fn push_history(&self, entry: CommandHistoryEntry) {
        let limit = self.history_limit;
        self.write(|d| {
            d.persisted.history.insert(0, entry);
            d.persisted.history.truncate(limit);
        });
        self.persist_quietly();
    }

    /// Command history, most recent first.
    pub fn history(&self) -> Vec<CommandHistoryEntry> {
        self.read(|d| d.persisted.history.clone())
    }

    pub fn clear_history(&self) {
        self.write(|d| d.persisted.history.clear());
        self.persist_quietly();
    }

    /// The last `pairs` exchanges as chat messages, oldest first.
    pub fn recent_pairs(&self, pairs: usize) -> Vec<ChatMessage> {
        self.read(|d| {
            let mut recent: Vec<&CommandHistoryEntry> =
                d.persisted.history.iter().take(pairs).collect();
            recent.reverse();
            recent
                .into_iter()
                .flat_map(|e| {
                    [
                        ChatMessage::user(e.input.clone()),
                        ChatMessage::assistant(e.response.clone()),
                    ]
                })
                .collect()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&SessionData) -> T) -> T {
        f(&self.data.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut SessionData) -> T) -> T {
        f(&mut self.data.write().unwrap_or_else(|e| e.into_inner()))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(storage: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read storage key");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring unreadable stored payload");
            None
        }
    }
}
