//! Domain Store Contract
//!
//! Read-only view of the application state owned by the wider application
//! (board, inbox, incident desk). The agent never writes through this
//! interface; mutations go through the Tool Registry and are observed here
//! with no read-after-write guarantee.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::workflow::WorkflowMode;

/// Task priority levels, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    /// Parse a loosely formatted priority ("High", "critical", "p1").
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "p3" => Some(Self::Low),
            "medium" | "normal" | "p2" => Some(Self::Medium),
            "high" | "p1" => Some(Self::High),
            "urgent" | "critical" | "p0" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

/// A task card on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column identifier within the active workflow mode.
    pub status: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub from: String,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: String,
    pub title: String,
    pub severity: String,
    pub status: String,
}

/// Identifiers of the currently focused items, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Full read of the domain store at one instant.
///
/// `emails` and `incidents` are `None` when the corresponding store is not
/// mounted in the host application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainState {
    pub tasks: Vec<TaskRecord>,
    pub projects: Vec<ProjectRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<EmailRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incidents: Option<Vec<IncidentRecord>>,
    #[serde(default)]
    pub selection: SelectionIds,
    #[serde(default)]
    pub auth: AuthInfo,
    #[serde(default)]
    pub workflow_mode: WorkflowMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<String>,
    #[serde(default)]
    pub unread_notifications: u32,
}

impl DomainState {
    /// Find a task by id.
    pub fn task(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Find the most recently updated task whose title matches, ignoring case.
    pub fn task_by_title(&self, title: &str) -> Option<&TaskRecord> {
        let needle = title.trim().to_lowercase();
        self.tasks
            .iter()
            .filter(|t| t.title.trim().to_lowercase() == needle)
            .max_by_key(|t| t.updated_at)
    }
}

/// Read path of the external domain store.
///
/// Implementations may be backed by a remote API or a local cache; reads are
/// synchronous snapshots and may lag behind writes made through the registry.
pub trait DomainStore: Send + Sync {
    fn get_state(&self) -> CoreResult<DomainState>;
}
