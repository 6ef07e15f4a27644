//! Session Models
//!
//! Command history entries and the persisted shape of the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpilot_llm::ProviderType;
use uuid::Uuid;

/// One completed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistoryEntry {
    pub id: String,
    pub input: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub tools_called: Vec<String>,
}

impl CommandHistoryEntry {
    pub fn new(
        input: impl Into<String>,
        response: impl Into<String>,
        success: bool,
        tools_called: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input: input.into(),
            response: response.into(),
            timestamp: Utc::now(),
            success,
            tools_called,
        }
    }
}

/// User-facing toggles carried with the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToggles {
    /// Voice input enabled
    #[serde(default)]
    pub voice_enabled: bool,
    /// Read responses aloud
    #[serde(default)]
    pub speak_responses: bool,
    /// Show per-tool results under each response
    #[serde(default = "default_true")]
    pub show_tool_details: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SessionToggles {
    fn default() -> Self {
        Self {
            voice_enabled: false,
            speak_responses: false,
            show_tool_details: true,
        }
    }
}

/// Partial toggle update
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TogglesUpdate {
    pub voice_enabled: Option<bool>,
    pub speak_responses: Option<bool>,
    pub show_tool_details: Option<bool>,
}

impl SessionToggles {
    pub fn apply_update(&mut self, update: TogglesUpdate) {
        if let Some(v) = update.voice_enabled {
            self.voice_enabled = v;
        }
        if let Some(v) = update.speak_responses {
            self.speak_responses = v;
        }
        if let Some(v) = update.show_tool_details {
            self.show_tool_details = v;
        }
    }
}

/// A remembered key/value fact, fed to the context snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
}

/// Session as stored under the session key. Credentials are never included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub active_provider: Option<ProviderType>,
    #[serde(default)]
    pub toggles: SessionToggles,
    /// Oldest first.
    #[serde(default)]
    pub memory: Vec<MemoryEntry>,
    /// Most recent first.
    #[serde(default)]
    pub history: Vec<CommandHistoryEntry>,
}
