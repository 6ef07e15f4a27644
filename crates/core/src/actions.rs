//! Typed Actions
//!
//! An `Action` is the request for a visible UI or control effect. Tools do not
//! perform these effects themselves; they publish an `Action` on the bus and a
//! bridge subscriber applies it later.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::workflow::WorkflowMode;

/// Where a command (and therefore its actions) originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSource {
    Voice,
    Terminal,
    Api,
    Internal,
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionSource::Voice => "voice",
            ActionSource::Terminal => "terminal",
            ActionSource::Api => "api",
            ActionSource::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// UI color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        };
        f.write_str(s)
    }
}

impl FromStr for Theme {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" | "auto" => Ok(Theme::System),
            other => Err(CoreError::validation(format!(
                "Unknown theme '{}'. Valid themes: light, dark, system",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl Default for ToastLevel {
    fn default() -> Self {
        Self::Info
    }
}

/// Payload of an action. The tag fully determines the payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    Navigate { page: String },
    GoBack,
    OpenTerminal,
    CloseTerminal,
    ChangeWorkflowMode { mode: WorkflowMode },
    SetTheme { theme: Theme },
    HighlightTask { task_id: String },
    ShowToast {
        message: String,
        #[serde(default)]
        level: ToastLevel,
    },
}

impl ActionPayload {
    /// Stable action type tag, identical to the serialized `type` field.
    pub fn action_type(&self) -> &'static str {
        match self {
            ActionPayload::Navigate { .. } => "navigate",
            ActionPayload::GoBack => "go_back",
            ActionPayload::OpenTerminal => "open_terminal",
            ActionPayload::CloseTerminal => "close_terminal",
            ActionPayload::ChangeWorkflowMode { .. } => "change_workflow_mode",
            ActionPayload::SetTheme { .. } => "set_theme",
            ActionPayload::HighlightTask { .. } => "highlight_task",
            ActionPayload::ShowToast { .. } => "show_toast",
        }
    }
}

/// A published action: payload plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub payload: ActionPayload,
    pub source: ActionSource,
    pub timestamp: DateTime<Utc>,
}

impl Action {
    /// Create an action stamped with the current time.
    pub fn new(payload: ActionPayload, source: ActionSource) -> Self {
        Self {
            payload,
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn action_type(&self) -> &'static str {
        self.payload.action_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_with_type_tag() {
        let action = Action::new(
            ActionPayload::SetTheme { theme: Theme::Dark },
            ActionSource::Voice,
        );
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "set_theme");
        assert_eq!(json["theme"], "dark");
        assert_eq!(json["source"], "voice");
    }

    #[test]
    fn test_action_type_matches_serialized_tag() {
        let payloads = vec![
            ActionPayload::Navigate { page: "board".into() },
            ActionPayload::GoBack,
            ActionPayload::OpenTerminal,
            ActionPayload::CloseTerminal,
            ActionPayload::ChangeWorkflowMode { mode: WorkflowMode::Itsm },
            ActionPayload::SetTheme { theme: Theme::Light },
            ActionPayload::HighlightTask { task_id: "t-1".into() },
            ActionPayload::ShowToast { message: "hi".into(), level: ToastLevel::Info },
        ];
        for payload in payloads {
            let json = serde_json::to_value(&payload).unwrap();
            assert_eq!(json["type"], payload.action_type());
        }
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("neon".parse::<Theme>().is_err());
    }
}
