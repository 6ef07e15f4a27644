//! In-memory Workspace
//!
//! Reference host for the agent: one value that is at the same time the
//! domain store (read path), the Tool Registry (write path) and the UI
//! effect target of the bridge. Used by the CLI and by tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use taskpilot_core::{
    CoreResult, DomainState, DomainStore, EmailRecord, IncidentRecord, ProjectRecord,
    TaskPriority, TaskRecord, Theme, ToastLevel, WorkflowMode,
};
use taskpilot_llm::ToolCall;
use taskpilot_tools::{ToolOutcome, ToolRegistry};
use uuid::Uuid;

use crate::services::bridge::UiEffects;

/// Interface state changed only through the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub theme: Theme,
    pub terminal_open: bool,
    /// Visited pages, current last.
    pub page_history: Vec<String>,
    pub highlighted_task: Option<String>,
    pub toasts: Vec<(ToastLevel, String)>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            terminal_open: false,
            page_history: Vec::new(),
            highlighted_task: None,
            toasts: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct InMemoryWorkspace {
    state: RwLock<DomainState>,
    ui: Mutex<UiState>,
    registry_calls: Mutex<Vec<String>>,
    ack_without_applying: AtomicBool,
}

impl InMemoryWorkspace {
    pub fn new(state: DomainState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Default::default()
        }
    }

    /// Small demo board used by the CLI.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let task = |id: &str, title: &str, status: &str, priority: TaskPriority| TaskRecord {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            status: status.to_string(),
            priority,
            project_id: Some("proj-web".to_string()),
            assignee: None,
            updated_at: now,
        };
        Self::new(DomainState {
            tasks: vec![
                task("task-1", "Set up CI pipeline", "done", TaskPriority::Medium),
                task("task-2", "Design login page", "in_progress", TaskPriority::High),
                task("task-3", "Write onboarding docs", "todo", TaskPriority::Low),
            ],
            projects: vec![
                ProjectRecord {
                    id: "proj-web".to_string(),
                    name: "Website".to_string(),
                },
                ProjectRecord {
                    id: "proj-ops".to_string(),
                    name: "Operations".to_string(),
                },
            ],
            current_project_id: Some("proj-web".to_string()),
            emails: Some(vec![EmailRecord {
                id: "email-1".to_string(),
                subject: "Invoice question".to_string(),
                from: "customer@example.com".to_string(),
                unread: true,
            }]),
            incidents: Some(Vec::new()),
            unread_notifications: 1,
            ..Default::default()
        })
    }

    /// Acknowledge writes with success without applying them.
    pub fn set_ack_without_applying(&self, enabled: bool) {
        self.ack_without_applying.store(enabled, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> DomainState {
        self.read(|s| s.clone())
    }

    pub fn ui(&self) -> UiState {
        self.ui.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of the tools executed through the registry, in order.
    pub fn registry_calls(&self) -> Vec<String> {
        self.registry_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_workflow_mode(&self, mode: WorkflowMode) {
        self.write(|s| s.workflow_mode = mode);
    }

    fn applying(&self) -> bool {
        !self.ack_without_applying.load(Ordering::SeqCst)
    }

    fn read<T>(&self, f: impl FnOnce(&DomainState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut DomainState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(|e| e.into_inner()))
    }

    fn ui_mut(&self, f: impl FnOnce(&mut UiState)) {
        f(&mut self.ui.lock().unwrap_or_else(|e| e.into_inner()))
    }

    // ── Tasks ──────────────────────────────────────────────────────────

    fn get_tasks(&self, args: &Value) -> Result<ToolOutcome, String> {
        let status = str_arg(args, "status");
        let priority = priority_arg(args)?;
        let project = str_arg(args, "project_id");
        let tasks: Vec<TaskRecord> = self.read(|s| {
            s.tasks
                .iter()
                .filter(|t| status.map_or(true, |st| t.status == st))
                .filter(|t| priority.map_or(true, |p| t.priority == p))
                .filter(|t| project.map_or(true, |p| t.project_id.as_deref() == Some(p)))
                .cloned()
                .collect()
        });
        Ok(ToolOutcome::ok(format!("Found {} task(s).", tasks.len())).with_data(json!(tasks)))
    }

    fn create_task(&self, args: &Value) -> Result<ToolOutcome, String> {
        let title = str_arg(args, "title").ok_or("A task title is required.")?;
        let priority = priority_arg(args)?.unwrap_or_default();
        let mode = self.read(|s| s.workflow_mode);
        let status = str_arg(args, "status").unwrap_or(mode.initial_column());

        let task = TaskRecord {
            id: new_id("task"),
            title: title.to_string(),
            description: str_arg(args, "description").map(str::to_string),
            status: status.to_string(),
            priority,
            project_id: str_arg(args, "project_id")
                .map(str::to_string)
                .or_else(|| self.read(|s| s.current_project_id.clone())),
            assignee: str_arg(args, "assignee").map(str::to_string),
            updated_at: Utc::now(),
        };
        if self.applying() {
            self.write(|s| s.tasks.push(task.clone()));
        }
        Ok(ToolOutcome::ok(format!(
            "Created task '{}' in {} with {} priority.",
            task.title, task.status, task.priority
        ))
        .with_data(json!(task)))
    }

    fn update_task(&self, args: &Value) -> Result<ToolOutcome, String> {
        let id = str_arg(args, "task_id").ok_or("A task_id is required.")?;
        let priority = priority_arg(args)?;
        let mut task = self
            .read(|s| s.task(id).cloned())
            .ok_or_else(|| format!("Task '{}' not found.", id))?;

        if let Some(title) = str_arg(args, "title") {
            task.title = title.to_string();
        }
        if let Some(description) = str_arg(args, "description") {
            task.description = Some(description.to_string());
        }
        if let Some(status) = str_arg(args, "status") {
            task.status = status.to_string();
        }
        if let Some(priority) = priority {
            task.priority = priority;
        }
        if let Some(assignee) = str_arg(args, "assignee") {
            task.assignee = Some(assignee.to_string());
        }
        task.updated_at = Utc::now();

        if self.applying() {
            self.write(|s| {
                if let Some(slot) = s.tasks.iter_mut().find(|t| t.id == task.id) {
                    *slot = task.clone();
                }
            });
        }
        Ok(ToolOutcome::ok(format!("Updated task '{}'.", task.title)).with_data(json!(task)))
    }

    fn delete_task(&self, args: &Value) -> Result<ToolOutcome, String> {
        let id = str_arg(args, "task_id").ok_or("A task_id is required.")?;
        let title = self
            .read(|s| s.task(id).map(|t| t.title.clone()))
            .ok_or_else(|| format!("Task '{}' not found.", id))?;
        if self.applying() {
            self.write(|s| s.tasks.retain(|t| t.id != id));
        }
        Ok(ToolOutcome::ok(format!("Deleted task '{}'.", title)).with_data(json!({ "id": id })))
    }

    fn search_tasks(&self, args: &Value) -> Result<ToolOutcome, String> {
        let query = str_arg(args, "query")
            .ok_or("A search query is required.")?
            .to_lowercase();
        let matches: Vec<TaskRecord> = self.read(|s| {
            s.tasks
                .iter()
                .filter(|t| {
                    t.title.to_lowercase().contains(&query)
                        || t.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(&query))
                })
                .cloned()
                .collect()
        });
        Ok(ToolOutcome::ok(format!("Found {} matching task(s).", matches.len())).with_data(json!(matches)))
    }

    fn select_task(&self, args: &Value) -> Result<ToolOutcome, String> {
        let id = str_arg(args, "task_id").ok_or("A task_id is required.")?;
        let title = self.write(|s| {
            let title = s.task(id).map(|t| t.title.clone())?;
            s.selection.task_id = Some(id.to_string());
            Some(title)
        });
        title
            .map(|t| ToolOutcome::ok(format!("Selected task '{}'.", t)))
            .ok_or_else(|| format!("Task '{}' not found.", id))
    }

    // ── Incidents ──────────────────────────────────────────────────────

    fn get_incidents(&self, args: &Value) -> Result<ToolOutcome, String> {
        let status = str_arg(args, "status");
        let incidents = self
            .read(|s| s.incidents.clone())
            .ok_or("The incident desk is not available.")?;
        let incidents: Vec<IncidentRecord> = incidents
            .into_iter()
            .filter(|i| status.map_or(true, |st| i.status.eq_ignore_ascii_case(st)))
            .collect();
        Ok(ToolOutcome::ok(format!("Found {} incident(s).", incidents.len())).with_data(json!(incidents)))
    }

    fn create_incident(&self, args: &Value) -> Result<ToolOutcome, String> {
        let title = str_arg(args, "title").ok_or("An incident title is required.")?;
        let incident = IncidentRecord {
            id: new_id("inc"),
            title: title.to_string(),
            severity: str_arg(args, "severity").unwrap_or("sev3").to_string(),
            status: "new".to_string(),
        };
        let applying = self.applying();
        self.write(|s| match s.incidents.as_mut() {
            Some(list) => {
                if applying {
                    list.push(incident.clone());
                }
                Ok(())
            }
            None => Err("The incident desk is not available.".to_string()),
        })?;
        Ok(ToolOutcome::ok(format!(
            "Opened incident '{}' ({}).",
            incident.title, incident.severity
        ))
        .with_data(json!(incident)))
    }

    fn update_incident(&self, args: &Value) -> Result<ToolOutcome, String> {
        let id = str_arg(args, "incident_id").ok_or("An incident_id is required.")?;
        let applying = self.applying();
        let incident = self.write(|s| {
            let list = s
                .incidents
                .as_mut()
                .ok_or_else(|| "The incident desk is not available.".to_string())?;
            let incident = list
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| format!("Incident '{}' not found.", id))?;
            let mut updated = incident.clone();
            if let Some(status) = str_arg(args, "status") {
                updated.status = status.to_string();
            }
            if let Some(severity) = str_arg(args, "severity") {
                updated.severity = severity.to_string();
            }
            if applying {
                *incident = updated.clone();
            }
            Ok::<_, String>(updated)
        })?;
        Ok(ToolOutcome::ok(format!("Updated incident '{}'.", incident.title)).with_data(json!(incident)))
    }

    // ── Emails ─────────────────────────────────────────────────────────

    fn get_emails(&self, args: &Value) -> Result<ToolOutcome, String> {
        let unread_only = args.get("unread_only").and_then(Value::as_bool).unwrap_or(false);
        let emails = self
            .read(|s| s.emails.clone())
            .ok_or("The inbox is not available.")?;
        let emails: Vec<EmailRecord> = emails
            .into_iter()
            .filter(|e| !unread_only || e.unread)
            .collect();
        Ok(ToolOutcome::ok(format!("Found {} email(s).", emails.len())).with_data(json!(emails)))
    }

    fn mark_email_read(&self, args: &Value) -> Result<ToolOutcome, String> {
        let id = str_arg(args, "email_id").ok_or("An email_id is required.")?;
        let applying = self.applying();
        let subject = self.write(|s| {
            let email = s
                .emails
                .as_mut()
                .ok_or_else(|| "The inbox is not available.".to_string())?
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| format!("Email '{}' not found.", id))?;
            if applying {
                email.unread = false;
            }
            Ok::<_, String>(email.subject.clone())
        })?;
        Ok(ToolOutcome::ok(format!("Marked '{}' as read.", subject)))
    }
}

#[async_trait]
impl ToolRegistry for InMemoryWorkspace {
    async fn execute_tool(&self, call: &ToolCall) -> ToolOutcome {
        self.registry_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.name.clone());

        let args = &call.arguments;
        let result = match call.name.as_str() {
            "get_tasks" => self.get_tasks(args),
            "create_task" => self.create_task(args),
            "update_task" => self.update_task(args),
            "delete_task" => self.delete_task(args),
            "search_tasks" => self.search_tasks(args),
            "select_task" => self.select_task(args),
            "get_incidents" => self.get_incidents(args),
            "create_incident" => self.create_incident(args),
            "update_incident" => self.update_incident(args),
            "get_emails" => self.get_emails(args),
            "mark_email_read" => self.mark_email_read(args),
            other => Err(format!("Unknown tool '{}'.", other)),
        };
        result.unwrap_or_else(ToolOutcome::err)
    }
}

impl DomainStore for InMemoryWorkspace {
    fn get_state(&self) -> CoreResult<DomainState> {
        Ok(self.snapshot())
    }
}

impl UiEffects for InMemoryWorkspace {
    fn navigate(&self, page: &str) {
        self.write(|s| s.current_page = Some(page.to_string()));
        self.ui_mut(|ui| ui.page_history.push(page.to_string()));
    }

    fn go_back(&self) {
        let mut previous = None;
        self.ui_mut(|ui| {
            ui.page_history.pop();
            previous = ui.page_history.last().cloned();
        });
        self.write(|s| s.current_page = previous);
    }

    fn set_terminal_visible(&self, visible: bool) {
        self.ui_mut(|ui| ui.terminal_open = visible);
    }

    fn switch_workflow(&self, mode: WorkflowMode) {
        self.set_workflow_mode(mode);
    }

    fn set_theme(&self, theme: Theme) {
        self.ui_mut(|ui| ui.theme = theme);
    }

    fn highlight_task(&self, task_id: &str) {
        self.ui_mut(|ui| ui.highlighted_task = Some(task_id.to_string()));
    }

    fn show_toast(&self, message: &str, level: ToastLevel) {
        self.ui_mut(|ui| ui.toasts.push((level, message.to_string())));
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn priority_arg(args: &Value) -> Result<Option<TaskPriority>, String> {
    match str_arg(args, "priority") {
        None => Ok(None),
        Some(raw) => TaskPriority::parse(raw).map(Some).ok_or_else(|| {
            format!(
                "Unknown priority '{}'. Valid priorities: low, medium, high, urgent",
                raw
            )
        }),
    }
}

fn new_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn test_create_then_update_task() {
        let ws = InMemoryWorkspace::seeded();
        let created = ws
            .execute_tool(&call("create_task", json!({"title": "Fix bug", "priority": "high"})))
            .await;
        assert!(created.success);
        let id = created.data.unwrap()["id"].as_str().unwrap().to_string();

        let task = ws.snapshot().task(&id).cloned().unwrap();
        assert_eq!(task.status, "backlog");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.project_id.as_deref(), Some("proj-web"));

        let updated = ws
            .execute_tool(&call("update_task", json!({"task_id": &id, "status": "done"})))
            .await;
        assert!(updated.success);
        assert_eq!(ws.snapshot().task(&id).unwrap().status, "done");
        assert_eq!(ws.registry_calls(), vec!["create_task", "update_task"]);
    }

    #[tokio::test]
    async fn test_ack_without_applying_reports_success_only() {
        let ws = InMemoryWorkspace::seeded();
        ws.set_ack_without_applying(true);
        let outcome = ws
            .execute_tool(&call("create_task", json!({"title": "Ghost"})))
            .await;
        assert!(outcome.success);
        assert!(ws.snapshot().task_by_title("Ghost").is_none());
    }

    #[tokio::test]
    async fn test_failures_are_outcomes() {
        let ws = InMemoryWorkspace::new(DomainState::default());
        let missing = ws
            .execute_tool(&call("update_task", json!({"task_id": "nope"})))
            .await;
        assert!(!missing.success);
        assert_eq!(missing.message, "Task 'nope' not found.");

        let bad_priority = ws
            .execute_tool(&call("create_task", json!({"title": "x", "priority": "asap"})))
            .await;
        assert!(bad_priority.message.contains("Valid priorities"));

        let no_desk = ws.execute_tool(&call("get_incidents", json!({}))).await;
        assert!(!no_desk.success);

        let unknown = ws.execute_tool(&call("launch_rocket", json!({}))).await;
        assert_eq!(unknown.message, "Unknown tool 'launch_rocket'.");
    }

    #[tokio::test]
    async fn test_email_and_incident_tools() {
        let ws = InMemoryWorkspace::seeded();
        let read = ws
            .execute_tool(&call("mark_email_read", json!({"email_id": "email-1"})))
            .await;
        assert!(read.success);
        let unread = ws
            .execute_tool(&call("get_emails", json!({"unread_only": true})))
            .await;
        assert_eq!(unread.message, "Found 0 email(s).");

        let opened = ws
            .execute_tool(&call("create_incident", json!({"title": "API down", "severity": "sev1"})))
            .await;
        assert!(opened.success);
        assert_eq!(ws.snapshot().incidents.unwrap().len(), 1);
    }

    #[test]
    fn test_ui_effects_update_state() {
        let ws = InMemoryWorkspace::seeded();
        ws.navigate("board");
        ws.navigate("settings");
        ws.go_back();
        ws.set_theme(Theme::Dark);
        ws.switch_workflow(WorkflowMode::Itsm);

        assert_eq!(ws.snapshot().current_page.as_deref(), Some("board"));
        assert_eq!(ws.snapshot().workflow_mode, WorkflowMode::Itsm);
        assert_eq!(ws.ui().theme, Theme::Dark);
    }
}
