//! Context Builder
//!
//! Snapshots the domain store, the action log and session memory into an
//! immutable [`ContextSnapshot`]. Never fails: a store read error degrades
//! to [`ContextSnapshot::minimal`].

use std::collections::BTreeMap;
use std::sync::Arc;

use taskpilot_core::snapshot::DEFAULT_PAGE;
use taskpilot_core::{
    ContextSnapshot, DomainState, DomainStore, RecentAction, SelectionSummary, TaskCounts,
    TaskPriority,
};
use taskpilot_tools::{ActionLogEntry, ActionLogger};

/// Recent task titles included in a snapshot.
pub const RECENT_TASK_WINDOW: usize = 10;
/// Logged actions included in a snapshot.
pub const RECENT_ACTION_WINDOW: usize = 5;

const SUMMARY_LIMIT: usize = 120;

pub struct ContextBuilder {
    store: Arc<dyn DomainStore>,
    logger: Arc<ActionLogger>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn DomainStore>, logger: Arc<ActionLogger>) -> Self {
        Self { store, logger }
    }

    pub fn build(&self, memory: &BTreeMap<String, String>) -> ContextSnapshot {
        let recent_actions = self
            .logger
            .recent(RECENT_ACTION_WINDOW)
            .iter()
            .map(summarize_entry)
            .collect();

        let mut snapshot = match self.store.get_state() {
            Ok(state) => snapshot_from_state(&state),
            Err(e) => {
                tracing::warn!(error = %e, "domain store read failed, using minimal context");
                ContextSnapshot::minimal()
            }
        };
        snapshot.recent_actions = recent_actions;
        snapshot.memory = memory.clone();
        snapshot
    }
}

fn snapshot_from_state(state: &DomainState) -> ContextSnapshot {
    let mode = state.workflow_mode;

    let mut by_status = BTreeMap::new();
    for task in &state.tasks {
        let column = mode.resolve_column(&task.status).unwrap_or(task.status.as_str());
        *by_status.entry(column.to_string()).or_insert(0) += 1;
    }
    let task_counts = TaskCounts {
        total: state.tasks.len(),
        by_status,
        high_priority: state
            .tasks
            .iter()
            .filter(|t| t.priority >= TaskPriority::High)
            .count(),
    };

    let mut recent: Vec<_> = state.tasks.iter().collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    let recent_tasks = recent
        .into_iter()
        .take(RECENT_TASK_WINDOW)
        .map(|t| t.title.clone())
        .collect();

    let current_project = state.current_project_id.as_ref().and_then(|id| {
        state
            .projects
            .iter()
            .find(|p| &p.id == id)
            .map(|p| p.name.clone())
    });

    ContextSnapshot {
        current_page: state
            .current_page
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PAGE.to_string()),
        workflow_mode: mode,
        workflow_columns: mode.columns().iter().map(|c| c.to_string()).collect(),
        task_counts,
        recent_tasks,
        unread_notifications: state.unread_notifications,
        projects: state.projects.iter().map(|p| p.name.clone()).collect(),
        current_project,
        authenticated: state.auth.authenticated,
        user_name: state.auth.user_name.clone(),
        selection: resolve_selection(state),
        recent_actions: Vec::new(),
        memory: BTreeMap::new(),
        degraded: false,
    }
}

/// Resolve selected ids to labels. A missing email or incident store, or
/// an id that no longer exists, leaves that slot empty.
fn resolve_selection(state: &DomainState) -> SelectionSummary {
    let ids = &state.selection;
    SelectionSummary {
        task: ids
            .task_id
            .as_deref()
            .and_then(|id| state.task(id))
            .map(|t| t.title.clone()),
        email: ids.email_id.as_deref().and_then(|id| {
            state
                .emails
                .as_ref()?
                .iter()
                .find(|e| e.id == id)
                .map(|e| format!("{} (from {})", e.subject, e.from))
        }),
        incident: ids.incident_id.as_deref().and_then(|id| {
            state
                .incidents
                .as_ref()?
                .iter()
                .find(|i| i.id == id)
                .map(|i| format!("{} [{}]", i.title, i.severity))
        }),
    }
}

fn summarize_entry(entry: &ActionLogEntry) -> RecentAction {
    let mut summary = entry.result.message.lines().next().unwrap_or_default().to_string();
    if summary.chars().count() > SUMMARY_LIMIT {
        summary = summary.chars().take(SUMMARY_LIMIT).collect::<String>() + "...";
    }
    RecentAction {
        action_type: entry.action_type.clone(),
        success: entry.result.success,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use taskpilot_core::{
        AuthInfo, CoreError, CoreResult, IncidentRecord, ProjectRecord, SelectionIds,
        TaskRecord, WorkflowMode,
    };
    use taskpilot_tools::ToolOutcome;

    struct FixedStore(DomainState);

    impl DomainStore for FixedStore {
        fn get_state(&self) -> CoreResult<DomainState> {
            Ok(self.0.clone())
        }
    }

    struct BrokenStore;

    impl DomainStore for BrokenStore {
        fn get_state(&self) -> CoreResult<DomainState> {
            Err(CoreError::store("backend offline"))
        }
    }

    fn task(id: &str, status: &str, priority: TaskPriority, minutes_ago: i64) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: format!("Task {}", id),
            description: None,
            status: status.to_string(),
            priority,
            project_id: None,
            assignee: None,
            updated_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn state() -> DomainState {
        let mut tasks: Vec<TaskRecord> = (0..12)
            .map(|i| task(&format!("t{:02}", i), "todo", TaskPriority::Low, i))
            .collect();
        tasks.push(task("hot", "In Progress", TaskPriority::Urgent, 100));
        tasks.push(task("warm", "done", TaskPriority::High, 200));
        DomainState {
            tasks,
            projects: vec![ProjectRecord {
                id: "p1".into(),
                name: "Payments".into(),
            }],
            current_project_id: Some("p1".into()),
            incidents: Some(vec![IncidentRecord {
                id: "i1".into(),
                title: "Checkout down".into(),
                severity: "sev1".into(),
                status: "triage".into(),
            }]),
            selection: SelectionIds {
                task_id: Some("hot".into()),
                email_id: Some("e1".into()),
                incident_id: Some("i1".into()),
            },
            auth: AuthInfo {
                authenticated: true,
                user_name: Some("Sam".into()),
                organization: None,
            },
            workflow_mode: WorkflowMode::Agile,
            unread_notifications: 3,
            ..Default::default()
        }
    }

    fn builder(store: Arc<dyn DomainStore>) -> (ContextBuilder, Arc<ActionLogger>) {
        let logger = Arc::new(ActionLogger::new(50));
        (ContextBuilder::new(store, logger.clone()), logger)
    }

    #[test]
    fn test_aggregates_tasks() {
        let (builder, _) = builder(Arc::new(FixedStore(state())));
        let snapshot = builder.build(&BTreeMap::new());

        assert!(!snapshot.degraded);
        assert_eq!(snapshot.current_page, DEFAULT_PAGE);
        assert_eq!(snapshot.task_counts.total, 14);
        assert_eq!(snapshot.task_counts.by_status["todo"], 12);
        assert_eq!(snapshot.task_counts.by_status["in_progress"], 1);
        assert_eq!(snapshot.task_counts.high_priority, 2);
        assert_eq!(snapshot.recent_tasks.len(), RECENT_TASK_WINDOW);
        assert_eq!(snapshot.recent_tasks[0], "Task t00");
        assert_eq!(snapshot.current_project.as_deref(), Some("Payments"));
        assert_eq!(snapshot.user_name.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_selection_tolerates_missing_email_store() {
        let (builder, _) = builder(Arc::new(FixedStore(state())));
        let selection = builder.build(&BTreeMap::new()).selection;
        assert_eq!(selection.task.as_deref(), Some("Task hot"));
        assert_eq!(selection.email, None);
        assert_eq!(selection.incident.as_deref(), Some("Checkout down [sev1]"));
    }

    #[test]
    fn test_read_failure_degrades_to_minimal() {
        let (builder, logger) = builder(Arc::new(BrokenStore));
        logger.record("agent", "s", "navigate", serde_json::json!({}), ToolOutcome::ok("Navigated to board."));
        let mut memory = BTreeMap::new();
        memory.insert("team".to_string(), "payments".to_string());

        let snapshot = builder.build(&memory);
        assert!(snapshot.degraded);
        assert!(!snapshot.authenticated);
        assert_eq!(snapshot.task_counts.total, 0);
        assert_eq!(snapshot.recent_actions.len(), 1);
        assert_eq!(snapshot.memory["team"], "payments");
    }

    #[test]
    fn test_recent_actions_window() {
        let (builder, logger) = builder(Arc::new(FixedStore(state())));
        for i in 0..8 {
            logger.record("agent", "s", &format!("tool_{}", i), serde_json::json!({}), ToolOutcome::err("nope\nmore"));
        }
        let actions = builder.build(&BTreeMap::new()).recent_actions;
        assert_eq!(actions.len(), RECENT_ACTION_WINDOW);
        assert_eq!(actions[0].action_type, "tool_3");
        assert_eq!(actions[4].summary, "nope");
        assert!(!actions[4].success);
    }
}
