//! Verifier
//!
//! Post-condition check for sensitive tools. After the registry reports
//! success, the domain store is re-read and the record is compared with the
//! arguments the model sent. The store gives no read-after-write guarantee,
//! so a missing record is re-read a few times before it counts as absent.
//!
//! A failed check annotates the result message. It never changes the
//! reported success flag.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpilot_core::workflow::normalize_column;
use taskpilot_core::{DomainState, DomainStore, TaskPriority, TaskRecord};
use taskpilot_llm::ToolCall;

use crate::registry::ToolOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Tools whose effects are re-read.
    pub tools: Vec<String>,
    /// Reads made before a record is declared not found.
    pub read_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tools: vec!["create_task".to_string(), "update_task".to_string()],
            read_attempts: 2,
            retry_delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Mismatch {
        record: String,
        fields: Vec<FieldMismatch>,
    },
    NotFound {
        record: String,
    },
    /// Tool not in the allow-list, or the tool already failed.
    Skipped,
}

impl VerificationOutcome {
    /// `None` when nothing was checked.
    pub fn passed(&self) -> Option<bool> {
        match self {
            VerificationOutcome::Verified => Some(true),
            VerificationOutcome::Mismatch { .. } | VerificationOutcome::NotFound { .. } => {
                Some(false)
            }
            VerificationOutcome::Skipped => None,
        }
    }

    /// Discrepancy note appended to the tool message, if any.
    pub fn annotation(&self) -> Option<String> {
        match self {
            VerificationOutcome::Mismatch { record, fields } => {
                let details: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} is '{}' (expected '{}')", f.field, f.actual, f.expected))
                    .collect();
                Some(format!(
                    "[verification] Task '{}' does not match the requested change: {}.",
                    record,
                    details.join("; ")
                ))
            }
            VerificationOutcome::NotFound { record } => Some(format!(
                "[verification] Task '{}' could not be found after the change; it may not have been applied yet.",
                record
            )),
            _ => None,
        }
    }
}

/// How the task under verification is located.
#[derive(Debug, Clone, PartialEq)]
enum Locator {
    Id(String),
    /// Only a task written at or after `since` counts, so a pre-existing
    /// task with the same title cannot stand in for a write that never
    /// happened.
    Title { title: String, since: DateTime<Utc> },
}

impl Locator {
    fn find<'a>(&self, state: &'a DomainState) -> Option<&'a TaskRecord> {
        match self {
            Locator::Id(id) => state.task(id),
            Locator::Title { title, since } => state
                .task_by_title(title)
                .filter(|task| task.updated_at >= *since),
        }
    }

    fn label(&self) -> &str {
        match self {
            Locator::Id(id) => id,
            Locator::Title { title, .. } => title,
        }
    }
}

pub struct Verifier {
    config: VerifierConfig,
    store: Arc<dyn DomainStore>,
}

impl Verifier {
    pub fn new(config: VerifierConfig, store: Arc<dyn DomainStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn applies_to(&self, tool: &str) -> bool {
        self.config.tools.iter().any(|t| t == tool)
    }

    /// Re-read the record touched by `call`. `started_at` is when the tool
    /// began executing.
    pub async fn verify(
        &self,
        call: &ToolCall,
        outcome: &ToolOutcome,
        started_at: DateTime<Utc>,
    ) -> VerificationOutcome {
        if !outcome.success || !self.applies_to(&call.name) {
            return VerificationOutcome::Skipped;
        }
        let Some(locator) = locate(call, outcome, started_at) else {
            tracing::debug!(tool = %call.name, "nothing to locate, skipping verification");
            return VerificationOutcome::Skipped;
        };
        let expected = expectations(&call.arguments);
        let attempts = self.config.read_attempts.max(1);

        for attempt in 1..=attempts {
            match self.store.get_state() {
                Ok(state) => {
                    if let Some(task) = locator.find(&state) {
                        let fields = compare(task, &expected);
                        let record = task.title.clone();
                        return if fields.is_empty() {
                            tracing::debug!(tool = %call.name, task = %task.id, "verified");
                            VerificationOutcome::Verified
                        } else {
                            tracing::warn!(
                                tool = %call.name,
                                task = %task.id,
                                mismatched = fields.len(),
                                "verification mismatch"
                            );
                            VerificationOutcome::Mismatch { record, fields }
                        };
                    }
                }
                Err(e) => {
                    tracing::warn!(tool = %call.name, attempt, error = %e, "verification read failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        tracing::warn!(tool = %call.name, record = locator.label(), "record not found during verification");
        VerificationOutcome::NotFound {
            record: arg(&call.arguments, "title")
                .unwrap_or(locator.label())
                .to_string(),
        }
    }
}

fn arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn locate(call: &ToolCall, outcome: &ToolOutcome, started_at: DateTime<Utc>) -> Option<Locator> {
    if let Some(id) = arg(&call.arguments, "task_id") {
        return Some(Locator::Id(id.to_string()));
    }
    let created_id = outcome
        .data
        .as_ref()
        .and_then(|d| d.get("id").or_else(|| d.pointer("/task/id")))
        .and_then(Value::as_str);
    if let Some(id) = created_id {
        return Some(Locator::Id(id.to_string()));
    }
    arg(&call.arguments, "title").map(|t| Locator::Title {
        title: t.to_string(),
        since: started_at,
    })
}

const CHECKED_FIELDS: [&str; 5] = ["title", "status", "priority", "description", "assignee"];

fn expectations(arguments: &Value) -> Vec<(&'static str, String)> {
    CHECKED_FIELDS
        .iter()
        .filter_map(|field| arg(arguments, field).map(|v| (*field, v.to_string())))
        .collect()
}

fn compare(task: &TaskRecord, expected: &[(&'static str, String)]) -> Vec<FieldMismatch> {
    expected
        .iter()
        .filter_map(|(field, want)| {
            let (matches, actual) = match *field {
                "title" => (task.title.trim() == want, task.title.clone()),
                "status" => (
                    normalize_column(&task.status) == normalize_column(want),
                    task.status.clone(),
                ),
                "priority" => (
                    TaskPriority::parse(want) == Some(task.priority),
                    task.priority.to_string(),
                ),
                "description" => (
                    task.description.as_deref().map(str::trim) == Some(want.as_str()),
                    task.description.clone().unwrap_or_default(),
                ),
                "assignee" => (
                    task.assignee.as_deref().map(str::trim) == Some(want.as_str()),
                    task.assignee.clone().unwrap_or_default(),
                ),
                _ => (true, String::new()),
            };
            (!matches).then(|| FieldMismatch {
                field: field.to_string(),
                expected: want.clone(),
                actual,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use taskpilot_core::{CoreError, CoreResult};

    struct FixedStore {
        state: Mutex<DomainState>,
        reads: AtomicUsize,
        appear_after: usize,
    }

    impl DomainStore for FixedStore {
        fn get_state(&self) -> CoreResult<DomainState> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.appear_after {
                return Ok(DomainState::default());
            }
            Ok(self.state.lock().unwrap().clone())
        }
    }

    struct BrokenStore;

    impl DomainStore for BrokenStore {
        fn get_state(&self) -> CoreResult<DomainState> {
            Err(CoreError::store("offline"))
        }
    }

    fn task(id: &str, title: &str, status: &str) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            status: status.to_string(),
            priority: TaskPriority::Medium,
            project_id: None,
            assignee: None,
            updated_at: Utc::now(),
        }
    }

    fn store_with(tasks: Vec<TaskRecord>, appear_after: usize) -> Arc<FixedStore> {
        Arc::new(FixedStore {
            state: Mutex::new(DomainState {
                tasks,
                ..Default::default()
            }),
            reads: AtomicUsize::new(0),
            appear_after,
        })
    }

    /// Moment just before the tool ran.
    fn t0() -> DateTime<Utc> {
        Utc::now() - chrono::Duration::seconds(1)
    }

    fn fast_config() -> VerifierConfig {
        VerifierConfig {
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn update(args: Value) -> ToolCall {
        ToolCall {
            id: "c".to_string(),
            name: "update_task".to_string(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn test_verified_when_record_matches() {
        let verifier = Verifier::new(fast_config(), store_with(vec![task("t1", "Fix bug", "done")], 0));
        let outcome = verifier
            .verify(&update(json!({"task_id": "t1", "status": "Done"})), &ToolOutcome::ok("ok"), t0())
            .await;
        assert_eq!(outcome, VerificationOutcome::Verified);
        assert_eq!(outcome.passed(), Some(true));
    }

    #[tokio::test]
    async fn test_mismatch_is_annotated() {
        let verifier = Verifier::new(fast_config(), store_with(vec![task("t1", "Fix bug", "todo")], 0));
        let outcome = verifier
            .verify(&update(json!({"task_id": "t1", "status": "done"})), &ToolOutcome::ok("ok"), t0())
            .await;
        let note = outcome.annotation().unwrap();
        assert!(note.contains("Fix bug"));
        assert!(note.contains("status is 'todo'"));
        assert_eq!(outcome.passed(), Some(false));
    }

    #[tokio::test]
    async fn test_late_record_found_on_retry() {
        let store = store_with(vec![task("t9", "Ship it", "todo")], 1);
        let verifier = Verifier::new(fast_config(), store.clone());
        let call = ToolCall {
            id: "c".to_string(),
            name: "create_task".to_string(),
            arguments: json!({"title": "Ship it"}),
        };
        let outcome = verifier
            .verify(&call, &ToolOutcome::ok("created").with_data(json!({"id": "t9"})), t0())
            .await;
        assert_eq!(outcome, VerificationOutcome::Verified);
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_after_all_attempts() {
        let store = store_with(vec![], 0);
        let verifier = Verifier::new(fast_config(), store.clone());
        let outcome = verifier
            .verify(&update(json!({"task_id": "ghost"})), &ToolOutcome::ok("ok"), t0())
            .await;
        assert!(matches!(outcome, VerificationOutcome::NotFound { .. }));
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_failure_counts_as_not_found() {
        let verifier = Verifier::new(fast_config(), Arc::new(BrokenStore));
        let outcome = verifier
            .verify(&update(json!({"task_id": "t1"})), &ToolOutcome::ok("ok"), t0())
            .await;
        assert!(matches!(outcome, VerificationOutcome::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_skips_failed_and_unlisted_tools() {
        let verifier = Verifier::new(fast_config(), Arc::new(BrokenStore));
        let failed = verifier
            .verify(&update(json!({"task_id": "t1"})), &ToolOutcome::err("nope"), t0())
            .await;
        assert_eq!(failed, VerificationOutcome::Skipped);
        let call = ToolCall {
            id: "c".to_string(),
            name: "delete_task".to_string(),
            arguments: json!({"task_id": "t1"}),
        };
        assert_eq!(
            verifier.verify(&call, &ToolOutcome::ok("ok"), t0()).await,
            VerificationOutcome::Skipped
        );
    }

    fn create(title: &str) -> ToolCall {
        ToolCall {
            id: "c".to_string(),
            name: "create_task".to_string(),
            arguments: json!({ "title": title }),
        }
    }

    #[tokio::test]
    async fn test_existing_task_with_same_title_does_not_verify_create() {
        let mut old = task("t1", "Fix bug", "todo");
        old.updated_at = Utc::now() - chrono::Duration::hours(2);
        let verifier = Verifier::new(fast_config(), store_with(vec![old], 0));
        let outcome = verifier
            .verify(&create("Fix bug"), &ToolOutcome::ok("created"), t0())
            .await;
        assert_eq!(
            outcome,
            VerificationOutcome::NotFound {
                record: "Fix bug".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fresh_task_found_by_title() {
        let verifier = Verifier::new(
            fast_config(),
            store_with(vec![task("t2", "Fix bug", "backlog")], 0),
        );
        let outcome = verifier
            .verify(&create("Fix bug"), &ToolOutcome::ok("created"), t0())
            .await;
        assert_eq!(outcome, VerificationOutcome::Verified);
    }
}
