//! Tool Definition catalog
//!
//! The process-static list of tools offered to the model, and which
//! workflow modes each one is valid in.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use taskpilot_core::WorkflowMode;
use taskpilot_llm::{ParameterSchema, ToolDefinition};

use crate::control::KNOWN_PAGES;

/// Task tools whose `status` argument names a workflow column.
pub const TASK_STATUS_TOOLS: [&str; 3] = ["get_tasks", "create_task", "update_task"];

const EVERY_MODE: &[WorkflowMode] = &WorkflowMode::ALL;
const ITSM_ONLY: &[WorkflowMode] = &[WorkflowMode::Itsm];
const SUPPORT_MODES: &[WorkflowMode] = &[WorkflowMode::Ccaas, WorkflowMode::Itsm];

/// Every tool definition, control tools included, in a fixed order.
pub fn catalog() -> &'static [ToolDefinition] {
    static CATALOG: OnceLock<Vec<ToolDefinition>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

pub fn definition(name: &str) -> Option<&'static ToolDefinition> {
    catalog().iter().find(|t| t.name == name)
}

/// Modes in which `tool` may be used. Unknown tools are unrestricted.
pub fn valid_modes(tool: &str) -> &'static [WorkflowMode] {
    if tool.contains("incident") {
        ITSM_ONLY
    } else if tool.contains("email") {
        SUPPORT_MODES
    } else {
        EVERY_MODE
    }
}

pub fn is_valid_in(tool: &str, mode: WorkflowMode) -> bool {
    valid_modes(tool).contains(&mode)
}

/// A tool unavailable in the current mode, with the modes it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RestrictedTool {
    pub name: String,
    pub valid_modes: Vec<WorkflowMode>,
}

/// Tools split by validity for one workflow mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAvailability {
    pub mode: WorkflowMode,
    pub available: Vec<ToolDefinition>,
    pub restricted: Vec<RestrictedTool>,
}

impl ToolAvailability {
    pub fn for_mode(mode: WorkflowMode) -> Self {
        let mut available = Vec::new();
        let mut restricted = Vec::new();
        for tool in catalog() {
            if is_valid_in(&tool.name, mode) {
                available.push(tool.clone());
            } else {
                restricted.push(RestrictedTool {
                    name: tool.name.clone(),
                    valid_modes: valid_modes(&tool.name).to_vec(),
                });
            }
        }
        Self {
            mode,
            available,
            restricted,
        }
    }
}

fn tool(name: &str, description: &str, props: Vec<(&str, ParameterSchema)>, required: &[&str]) -> ToolDefinition {
    let properties: BTreeMap<String, ParameterSchema> = props
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: ParameterSchema::object(
            None,
            properties,
            required.iter().map(|r| r.to_string()).collect(),
        ),
    }
}

fn priority() -> ParameterSchema {
    ParameterSchema::string_enum(Some("Task priority"), &["low", "medium", "high", "urgent"])
}

fn status() -> ParameterSchema {
    ParameterSchema::string(Some(
        "Workflow column identifier. Must be one of the columns of the current workflow mode.",
    ))
}

fn build_catalog() -> Vec<ToolDefinition> {
    vec![
        // Tasks
        tool(
            "get_tasks",
            "List tasks, optionally filtered by column or priority.",
            vec![
                ("status", status()),
                ("priority", priority()),
                ("project_id", ParameterSchema::string(Some("Restrict to one project"))),
            ],
            &[],
        ),
        tool(
            "create_task",
            "Create a new task on the board.",
            vec![
                ("title", ParameterSchema::string(Some("Task title"))),
                ("description", ParameterSchema::string(Some("Longer description"))),
                ("status", status()),
                ("priority", priority()),
                ("project_id", ParameterSchema::string(Some("Project to add the task to"))),
                ("assignee", ParameterSchema::string(Some("Person responsible"))),
            ],
            &["title"],
        ),
        tool(
            "update_task",
            "Update fields of an existing task, including moving it to another column.",
            vec![
                ("task_id", ParameterSchema::string(Some("Identifier of the task"))),
                ("title", ParameterSchema::string(Some("New title"))),
                ("description", ParameterSchema::string(Some("New description"))),
                ("status", status()),
                ("priority", priority()),
                ("assignee", ParameterSchema::string(Some("New assignee"))),
            ],
            &["task_id"],
        ),
        tool(
            "delete_task",
            "Delete a task permanently.",
            vec![("task_id", ParameterSchema::string(Some("Identifier of the task")))],
            &["task_id"],
        ),
        tool(
            "search_tasks",
            "Find tasks whose title or description contains the query.",
            vec![("query", ParameterSchema::string(Some("Text to search for")))],
            &["query"],
        ),
        tool(
            "select_task",
            "Make a task the current selection.",
            vec![("task_id", ParameterSchema::string(Some("Identifier of the task")))],
            &["task_id"],
        ),
        // Incidents
        tool(
            "get_incidents",
            "List incidents, optionally filtered by status.",
            vec![("status", ParameterSchema::string(Some("Incident status")))],
            &[],
        ),
        tool(
            "create_incident",
            "Open a new incident.",
            vec![
                ("title", ParameterSchema::string(Some("Incident title"))),
                (
                    "severity",
                    ParameterSchema::string_enum(
                        Some("Incident severity"),
                        &["sev1", "sev2", "sev3", "sev4"],
                    ),
                ),
            ],
            &["title"],
        ),
        tool(
            "update_incident",
            "Change the status or severity of an incident.",
            vec![
                ("incident_id", ParameterSchema::string(Some("Identifier of the incident"))),
                ("status", ParameterSchema::string(Some("New incident status"))),
                (
                    "severity",
                    ParameterSchema::string_enum(None, &["sev1", "sev2", "sev3", "sev4"]),
                ),
            ],
            &["incident_id"],
        ),
        // Emails
        tool(
            "get_emails",
            "List emails in the shared inbox.",
            vec![("unread_only", ParameterSchema::boolean(Some("Only unread emails")))],
            &[],
        ),
        tool(
            "mark_email_read",
            "Mark an email as read.",
            vec![("email_id", ParameterSchema::string(Some("Identifier of the email")))],
            &["email_id"],
        ),
        // UI control
        tool(
            "navigate",
            "Navigate to a page of the application.",
            vec![(
                "page",
                ParameterSchema::string_enum(Some("Destination page"), &KNOWN_PAGES),
            )],
            &["page"],
        ),
        tool("go_back", "Return to the previous page.", vec![], &[]),
        tool("open_terminal", "Open the command terminal panel.", vec![], &[]),
        tool("close_terminal", "Close the command terminal panel.", vec![], &[]),
        tool(
            "change_workflow_mode",
            "Switch the board to another workflow mode.",
            vec![(
                "mode",
                ParameterSchema::string_enum(Some("Workflow mode"), &["agile", "ccaas", "itsm"]),
            )],
            &["mode"],
        ),
        tool(
            "set_theme",
            "Change the color theme.",
            vec![(
                "theme",
                ParameterSchema::string_enum(Some("Color theme"), &["light", "dark", "system"]),
            )],
            &["theme"],
        ),
        tool(
            "highlight_task",
            "Visually highlight a task on the board.",
            vec![("task_id", ParameterSchema::string(Some("Identifier of the task")))],
            &["task_id"],
        ),
        tool(
            "show_toast",
            "Show a short notification to the user.",
            vec![
                ("message", ParameterSchema::string(Some("Notification text"))),
                (
                    "level",
                    ParameterSchema::string_enum(None, &["info", "success", "warning", "error"]),
                ),
            ],
            &["message"],
        ),
    ]
}
