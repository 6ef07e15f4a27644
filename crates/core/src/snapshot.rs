//! Context Snapshot
//!
//! Immutable, pure-value read of the application state for one agent turn.
//! Built fresh per command, compiled into a prompt, then discarded. All maps
//! are ordered so the compiled prompt is byte-for-byte reproducible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowMode;

/// Page shown when the host did not report one.
pub const DEFAULT_PAGE: &str = "dashboard";

/// Aggregated task counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Tasks at or above the high-priority threshold.
    pub high_priority: usize,
}

/// Resolved labels of the focused items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub task: Option<String>,
    pub email: Option<String>,
    pub incident: Option<String>,
}

impl SelectionSummary {
    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.email.is_none() && self.incident.is_none()
    }
}

/// One line of recent agent activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentAction {
    pub action_type: String,
    pub success: bool,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub current_page: String,
    pub workflow_mode: WorkflowMode,
    pub workflow_columns: Vec<String>,
    pub task_counts: TaskCounts,
    /// Titles of the most recently updated tasks, newest first.
    pub recent_tasks: Vec<String>,
    pub unread_notifications: u32,
    pub projects: Vec<String>,
    pub current_project: Option<String>,
    pub authenticated: bool,
    pub user_name: Option<String>,
    pub selection: SelectionSummary,
    /// Most recent logged actions, oldest first.
    pub recent_actions: Vec<RecentAction>,
    pub memory: BTreeMap<String, String>,
    /// True when the snapshot fell back to defaults because a read failed.
    pub degraded: bool,
}

impl ContextSnapshot {
    /// Well-defined fallback: empty counts, unauthenticated, default workflow.
    pub fn minimal() -> Self {
        let mode = WorkflowMode::default();
        Self {
            current_page: DEFAULT_PAGE.to_string(),
            workflow_mode: mode,
            workflow_columns: mode.columns().iter().map(|c| c.to_string()).collect(),
            task_counts: TaskCounts::default(),
            recent_tasks: Vec::new(),
            unread_notifications: 0,
            projects: Vec::new(),
            current_project: None,
            authenticated: false,
            user_name: None,
            selection: SelectionSummary::default(),
            recent_actions: Vec::new(),
            memory: BTreeMap::new(),
            degraded: true,
        }
    }
}
