//! Internal control tools
//!
//! Tool names handled inside the agent: each maps to one typed
//! [`ActionPayload`] published on the Action Event Bus and is never sent to
//! the Tool Registry.

use serde_json::Value;
use taskpilot_core::{ActionPayload, Theme, ToastLevel, WorkflowMode};
use taskpilot_llm::ToolCall;

use crate::error::ToolError;

pub const CONTROL_TOOLS: [&str; 8] = [
    "navigate",
    "go_back",
    "open_terminal",
    "close_terminal",
    "change_workflow_mode",
    "set_theme",
    "highlight_task",
    "show_toast",
];

/// Pages `navigate` accepts.
pub const KNOWN_PAGES: [&str; 9] = [
    "dashboard",
    "board",
    "tasks",
    "projects",
    "inbox",
    "incidents",
    "settings",
    "analytics",
    "calendar",
];

pub fn is_control_tool(name: &str) -> bool {
    CONTROL_TOOLS.contains(&name)
}

fn str_arg<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str, ToolError> {
    call.arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::MissingArguments {
            tool: call.name.clone(),
            missing: vec![key.to_string()],
        })
}

/// Validate a control tool call and build its action.
pub fn control_action(call: &ToolCall) -> Result<ActionPayload, ToolError> {
    let payload = match call.name.as_str() {
        "navigate" => {
            let page = str_arg(call, "page")?.to_ascii_lowercase();
            if !KNOWN_PAGES.contains(&page.as_str()) {
                return Err(ToolError::invalid_argument(
                    &call.name,
                    format!(
                        "unknown page '{}'. Known pages: {}",
                        page,
                        KNOWN_PAGES.join(", ")
                    ),
                ));
            }
            ActionPayload::Navigate { page }
        }
        "go_back" => ActionPayload::GoBack,
        "open_terminal" => ActionPayload::OpenTerminal,
        "close_terminal" => ActionPayload::CloseTerminal,
        "change_workflow_mode" => {
            let mode: WorkflowMode = str_arg(call, "mode")?
                .parse()
                .map_err(|e: taskpilot_core::CoreError| {
                    ToolError::invalid_argument(&call.name, e.to_string())
                })?;
            ActionPayload::ChangeWorkflowMode { mode }
        }
        "set_theme" => {
            let theme: Theme = str_arg(call, "theme")?
                .parse()
                .map_err(|e: taskpilot_core::CoreError| {
                    ToolError::invalid_argument(&call.name, e.to_string())
                })?;
            ActionPayload::SetTheme { theme }
        }
        "highlight_task" => ActionPayload::HighlightTask {
            task_id: str_arg(call, "task_id")?.to_string(),
        },
        "show_toast" => {
            let level = match call.arguments.get("level").and_then(Value::as_str) {
                None => ToastLevel::default(),
                Some(level) => serde_json::from_value(Value::String(level.to_ascii_lowercase()))
                    .map_err(|_| {
                        ToolError::invalid_argument(
                            &call.name,
                            format!(
                                "unknown level '{}'. Valid levels: info, success, warning, error",
                                level
                            ),
                        )
                    })?,
            };
            ActionPayload::ShowToast {
                message: str_arg(call, "message")?.to_string(),
                level,
            }
        }
        other => return Err(ToolError::UnknownControl(other.to_string())),
    };
    Ok(payload)
}

/// Acknowledgement returned to the model once the action is published.
pub fn acknowledgement(payload: &ActionPayload) -> String {
    match payload {
        ActionPayload::Navigate { page } => format!("Navigating to the {} page.", page),
        ActionPayload::GoBack => "Going back to the previous page.".to_string(),
        ActionPayload::OpenTerminal => "Terminal opened.".to_string(),
        ActionPayload::CloseTerminal => "Terminal closed.".to_string(),
        ActionPayload::ChangeWorkflowMode { mode } => format!(
            "Workflow switched to {} mode. Columns: {}.",
            mode.label(),
            mode.column_list()
        ),
        ActionPayload::SetTheme { theme } => format!("Theme set to {}.", theme),
        ActionPayload::HighlightTask { task_id } => format!("Task {} highlighted.", task_id),
        ActionPayload::ShowToast { message, .. } => format!("Notification shown: {}", message),
    }
}
