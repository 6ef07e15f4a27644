//! Workflow Modes
//!
//! A workflow mode is a named set of pipeline columns. The active mode decides
//! which task status values are valid and which tools make sense.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Named pipeline configurations supported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    /// Software delivery board.
    Agile,
    /// Contact-center case handling.
    Ccaas,
    /// IT service management (incidents).
    Itsm,
}

impl Default for WorkflowMode {
    fn default() -> Self {
        Self::Agile
    }
}

impl WorkflowMode {
    /// Every mode, in display order.
    pub const ALL: [WorkflowMode; 3] = [WorkflowMode::Agile, WorkflowMode::Ccaas, WorkflowMode::Itsm];

    /// Column identifiers of this mode, in pipeline order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            WorkflowMode::Agile => &["backlog", "todo", "in_progress", "review", "done"],
            WorkflowMode::Ccaas => &[
                "new",
                "assigned",
                "in_progress",
                "waiting_on_customer",
                "resolved",
            ],
            WorkflowMode::Itsm => &[
                "new",
                "triage",
                "investigating",
                "pending",
                "resolved",
                "closed",
            ],
        }
    }

    /// Column a newly created task lands in when no status is given.
    pub fn initial_column(&self) -> &'static str {
        self.columns()[0]
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowMode::Agile => "Agile",
            WorkflowMode::Ccaas => "CCaaS",
            WorkflowMode::Itsm => "ITSM",
        }
    }

    /// Whether `column` names a column of this mode.
    ///
    /// Matching ignores case and treats spaces and dashes as underscores, so
    /// "In Progress" and "in-progress" both resolve to `in_progress`.
    pub fn resolve_column(&self, column: &str) -> Option<&'static str> {
        let normalized = normalize_column(column);
        self.columns().iter().copied().find(|c| *c == normalized)
    }

    /// Comma-separated column list for user-facing messages.
    pub fn column_list(&self) -> String {
        self.columns().join(", ")
    }
}

/// Normalize a free-form column name to the identifier form.
pub fn normalize_column(column: &str) -> String {
    column
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowMode::Agile => write!(f, "agile"),
            WorkflowMode::Ccaas => write!(f, "ccaas"),
            WorkflowMode::Itsm => write!(f, "itsm"),
        }
    }
}

impl FromStr for WorkflowMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agile" | "scrum" => Ok(WorkflowMode::Agile),
            "ccaas" | "contact_center" | "contact-center" => Ok(WorkflowMode::Ccaas),
            "itsm" | "service_management" => Ok(WorkflowMode::Itsm),
            other => Err(CoreError::validation(format!(
                "Unknown workflow mode '{}'. Valid modes: agile, ccaas, itsm",
                other
            ))),
        }
    }
}
