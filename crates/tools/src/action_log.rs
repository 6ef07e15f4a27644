//! Action Logger
//!
//! Capped, append-only audit ring buffer of every tool execution. Oldest
//! entries are evicted first. Recent entries feed the next context snapshot.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::ToolOutcome;

/// Default number of retained entries.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Action type recorded for a panic caught at the top of a command.
pub const INTERNAL_ERROR_ACTION: &str = "internal_error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: String,
    pub actor: String,
    pub session_id: String,
    pub action_type: String,
    pub params: serde_json::Value,
    pub result: ToolOutcome,
    /// Set at most once, by the verifier.
    #[serde(default)]
    pub verified: Option<bool>,
    pub created_at: DateTime<Utc>,
}

pub struct ActionLogger {
    capacity: usize,
    entries: Mutex<VecDeque<ActionLogEntry>>,
}

impl Default for ActionLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl ActionLogger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry and return its id.
    pub fn record(
        &self,
        actor: &str,
        session_id: &str,
        action_type: &str,
        params: serde_json::Value,
        result: ToolOutcome,
    ) -> String {
        let entry = ActionLogEntry {
            id: Uuid::new_v4().to_string(),
            actor: actor.to_string(),
            session_id: session_id.to_string(),
            action_type: action_type.to_string(),
            params,
            result,
            verified: None,
            created_at: Utc::now(),
        };
        let id = entry.id.clone();
        tracing::debug!(action_type, session_id, success = entry.result.success, "action logged");

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        id
    }

    /// Record the verification verdict. Returns false if the entry is gone
    /// or was already marked.
    pub fn mark_verified(&self, id: &str, verified: bool) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.verified.is_none() => {
                entry.verified = Some(verified);
                true
            }
            _ => false,
        }
    }

    /// The `count` newest entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<ActionLogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<ActionLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn entries(&self) -> Vec<ActionLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Replace the buffer with persisted entries, keeping the newest ones.
    pub fn restore(&self, restored: Vec<ActionLogEntry>) {
        let skip = restored.len().saturating_sub(self.capacity);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        *entries = restored.into_iter().skip(skip).collect();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_n(logger: &ActionLogger, n: usize) {
        for i in 0..n {
            logger.record("agent", "s1", "update_task", json!({ "n": i }), ToolOutcome::ok("ok"));
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let logger = ActionLogger::new(500);
        log_n(&logger, 501);
        let entries = logger.entries();
        assert_eq!(entries.len(), 500);
        assert_eq!(entries[0].params["n"], 1);
        assert_eq!(entries[499].params["n"], 500);
    }

    #[test]
    fn test_recent_returns_newest_in_order() {
        let logger = ActionLogger::new(10);
        log_n(&logger, 7);
        let recent = logger.recent(5);
        let ns: Vec<i64> = recent.iter().map(|e| e.params["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![2, 3, 4, 5, 6]);
        assert_eq!(logger.recent(50).len(), 7);
    }

    #[test]
    fn test_verified_is_set_once() {
        let logger = ActionLogger::default();
        let id = logger.record("agent", "s1", "create_task", json!({}), ToolOutcome::ok("ok"));
        assert!(logger.mark_verified(&id, false));
        assert!(!logger.mark_verified(&id, true));
        assert_eq!(logger.get(&id).unwrap().verified, Some(false));
        assert!(!logger.mark_verified("missing", true));
    }

    #[test]
    fn test_restore_trims_to_capacity() {
        let source = ActionLogger::new(10);
        log_n(&source, 8);
        let target = ActionLogger::new(5);
        target.restore(source.entries());
        assert_eq!(target.len(), 5);
        assert_eq!(target.entries()[0].params["n"], 3);
    }
}
