//! Tool Executor
//!
//! Routes a model-requested tool call either to internal UI control (an
//! Action published on the bus) or to the external Tool Registry. Domain
//! calls are validated first against the current workflow mode and the
//! tool's declared required arguments. Every execution is logged, and
//! sensitive ones are verified afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use taskpilot_core::{Action, ActionBus, ActionSource, DomainStore, WorkflowMode};
use taskpilot_llm::{ToolCall, ToolInvocationResult, ToolInvoker};

use crate::action_log::ActionLogger;
use crate::catalog::{self, TASK_STATUS_TOOLS};
use crate::control::{acknowledgement, control_action, is_control_tool};
use crate::error::ToolError;
use crate::registry::{ToolOutcome, ToolRegistry};
use crate::verifier::{Verifier, VerifierConfig};

/// Who is executing, for the audit log and action provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionScope {
    pub session_id: String,
    pub source: ActionSource,
    pub actor: String,
}

impl ExecutionScope {
    pub fn new(session_id: impl Into<String>, source: ActionSource) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            actor: "agent".to_string(),
        }
    }
}

pub struct ToolExecutor {
    registry: Arc<dyn ToolRegistry>,
    store: Arc<dyn DomainStore>,
    bus: Arc<dyn ActionBus>,
    logger: Arc<ActionLogger>,
    verifier: Verifier,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        store: Arc<dyn DomainStore>,
        bus: Arc<dyn ActionBus>,
        logger: Arc<ActionLogger>,
        verifier_config: VerifierConfig,
    ) -> Self {
        let verifier = Verifier::new(verifier_config, store.clone());
        Self {
            registry,
            store,
            bus,
            logger,
            verifier,
        }
    }

    pub fn logger(&self) -> &Arc<ActionLogger> {
        &self.logger
    }

    /// Bind a scope, producing the invoker handed to a provider.
    pub fn scoped(&self, scope: ExecutionScope) -> ScopedExecutor<'_> {
        ScopedExecutor {
            executor: self,
            scope,
        }
    }

    /// Execute one tool call. Never fails: problems become a failed outcome.
    pub async fn execute(&self, call: &ToolCall, scope: &ExecutionScope) -> ToolOutcome {
        if is_control_tool(&call.name) {
            let outcome = self.execute_control(call, scope);
            self.logger.record(
                &scope.actor,
                &scope.session_id,
                &call.name,
                call.arguments.clone(),
                outcome.clone(),
            );
            return outcome;
        }

        let started_at = Utc::now();
        let (call, outcome) = match self.prepare(call) {
            Ok(prepared) => {
                tracing::info!(tool = %prepared.name, session_id = %scope.session_id, "forwarding to tool registry");
                let outcome = self.registry.execute_tool(&prepared).await;
                (prepared, outcome)
            }
            Err(e) => {
                tracing::info!(tool = %call.name, error = %e, "tool call rejected");
                (call.clone(), ToolOutcome::err(e.to_string()))
            }
        };

        let entry_id = self.logger.record(
            &scope.actor,
            &scope.session_id,
            &call.name,
            call.arguments.clone(),
            outcome.clone(),
        );

        let verification = self.verifier.verify(&call, &outcome, started_at).await;
        let mut outcome = outcome;
        if let Some(passed) = verification.passed() {
            self.logger.mark_verified(&entry_id, passed);
        }
        if let Some(note) = verification.annotation() {
            outcome.message = format!("{}\n{}", outcome.message, note);
        }
        outcome
    }

    fn execute_control(&self, call: &ToolCall, scope: &ExecutionScope) -> ToolOutcome {
        match control_action(call) {
            Ok(payload) => {
                let message = acknowledgement(&payload);
                let action = Action::new(payload, scope.source);
                let data = json!({ "action": action.action_type() });
                tracing::info!(
                    tool = %call.name,
                    subscribers = self.bus.subscriber_count(),
                    "publishing control action"
                );
                self.bus.publish(action);
                ToolOutcome::ok(message).with_data(data)
            }
            Err(e) => ToolOutcome::err(e.to_string()),
        }
    }

    /// Validate a domain call against the catalog and the current mode.
    ///
    /// Unknown tools are forwarded untouched. A recognised task status is
    /// rewritten to its canonical column identifier.
    fn prepare(&self, call: &ToolCall) -> Result<ToolCall, ToolError> {
        let Some(definition) = catalog::definition(&call.name) else {
            return Ok(call.clone());
        };

        let mode = match self.store.get_state() {
            Ok(state) => Some(state.workflow_mode),
            Err(e) => {
                tracing::warn!(error = %e, "could not read workflow mode, skipping mode checks");
                None
            }
        };

        if let Some(mode) = mode {
            if !catalog::is_valid_in(&call.name, mode) {
                return Err(ToolError::InvalidInMode {
                    tool: call.name.clone(),
                    mode,
                    valid_modes: catalog::valid_modes(&call.name)
                        .iter()
                        .map(WorkflowMode::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        let missing: Vec<String> = definition
            .input_schema
            .required_fields()
            .iter()
            .filter(|field| is_blank(call.arguments.get(field.as_str())))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingArguments {
                tool: call.name.clone(),
                missing,
            });
        }

        let mut prepared = call.clone();
        if let (Some(mode), true) = (mode, TASK_STATUS_TOOLS.contains(&call.name.as_str())) {
            if let Some(status) = call.arguments.get("status").and_then(Value::as_str) {
                let column = mode
                    .resolve_column(status)
                    .ok_or_else(|| ToolError::invalid_column(status, mode))?;
                prepared.arguments["status"] = json!(column);
            }
        }
        Ok(prepared)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// A [`ToolExecutor`] bound to one command's scope.
pub struct ScopedExecutor<'a> {
    executor: &'a ToolExecutor,
    scope: ExecutionScope,
}

#[async_trait]
impl<'a> ToolInvoker for ScopedExecutor<'a> {
    async fn invoke(&self, call: &ToolCall) -> ToolInvocationResult {
        self.executor.execute(call, &self.scope).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use taskpilot_core::{CoreResult, DomainState, InProcessActionBus};

    #[derive(Default)]
    struct RecordingRegistry {
        calls: Mutex<Vec<ToolCall>>,
    }

    #[async_trait]
    impl ToolRegistry for RecordingRegistry {
        async fn execute_tool(&self, call: &ToolCall) -> ToolOutcome {
            self.calls.lock().unwrap().push(call.clone());
            ToolOutcome::ok(format!("{} done", call.name))
        }
    }

    struct ModeStore(WorkflowMode);

    impl DomainStore for ModeStore {
        fn get_state(&self) -> CoreResult<DomainState> {
            Ok(DomainState {
                workflow_mode: self.0,
                ..Default::default()
            })
        }
    }

    struct Fixture {
        registry: Arc<RecordingRegistry>,
        bus: InProcessActionBus,
        executor: ToolExecutor,
    }

    fn fixture(mode: WorkflowMode) -> Fixture {
        let registry = Arc::new(RecordingRegistry::default());
        let bus = InProcessActionBus::new();
        let executor = ToolExecutor::new(
            registry.clone(),
            Arc::new(ModeStore(mode)),
            Arc::new(bus.clone()),
            Arc::new(ActionLogger::default()),
            VerifierConfig {
                tools: vec![],
                read_attempts: 1,
                retry_delay: Duration::from_millis(1),
            },
        );
        Fixture {
            registry,
            bus,
            executor,
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "c1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    fn scope() -> ExecutionScope {
        ExecutionScope::new("session-1", ActionSource::Voice)
    }

    #[tokio::test]
    async fn test_control_tools_publish_and_never_forward() {
        let fx = fixture(WorkflowMode::Agile);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = fx.bus.subscribe(Arc::new(move |a: &Action| {
            sink.lock().unwrap().push(a.clone());
        }));

        let calls = [
            call("navigate", json!({"page": "board"})),
            call("go_back", json!({})),
            call("open_terminal", json!({})),
            call("close_terminal", json!({})),
            call("change_workflow_mode", json!({"mode": "ccaas"})),
        ];
        for c in &calls {
            let outcome = fx.executor.execute(c, &scope()).await;
            assert!(outcome.success, "{}", outcome.message);
        }

        assert!(fx.registry.calls.lock().unwrap().is_empty());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|a| a.source == ActionSource::Voice));
        assert_eq!(fx.executor.logger().len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_control_arguments_fail_without_publishing() {
        let fx = fixture(WorkflowMode::Agile);
        let outcome = fx
            .executor
            .execute(&call("set_theme", json!({"theme": "neon"})), &scope())
            .await;
        assert!(!outcome.success);
        assert!(fx.registry.calls.lock().unwrap().is_empty());
        assert_eq!(fx.executor.logger().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_column_lists_alternatives() {
        let fx = fixture(WorkflowMode::Agile);
        let outcome = fx
            .executor
            .execute(&call("update_task", json!({"task_id": "t1", "status": "ready"})), &scope())
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("ready"));
        assert!(outcome.message.contains("backlog, todo, in_progress, review, done"));
        assert!(fx.registry.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_is_canonicalised() {
        let fx = fixture(WorkflowMode::Agile);
        let outcome = fx
            .executor
            .execute(&call("update_task", json!({"task_id": "t1", "status": "In Progress"})), &scope())
            .await;
        assert!(outcome.success);
        assert_eq!(fx.registry.calls.lock().unwrap()[0].arguments["status"], "in_progress");
    }

    #[tokio::test]
    async fn test_mode_restricted_tool_rejected() {
        let fx = fixture(WorkflowMode::Agile);
        let outcome = fx
            .executor
            .execute(&call("create_incident", json!({"title": "DB down"})), &scope())
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("itsm"));

        let fx = fixture(WorkflowMode::Itsm);
        let outcome = fx
            .executor
            .execute(&call("create_incident", json!({"title": "DB down"})), &scope())
            .await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let fx = fixture(WorkflowMode::Agile);
        let outcome = fx
            .executor
            .execute(&call("create_task", json!({"title": "  "})), &scope())
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("title"));
    }

    #[tokio::test]
    async fn test_unknown_tool_forwarded_unchanged() {
        let fx = fixture(WorkflowMode::Agile);
        let args = json!({"anything": 1});
        let outcome = fx.executor.execute(&call("archive_project", args.clone()), &scope()).await;
        assert!(outcome.success);
        let calls = fx.registry.calls.lock().unwrap();
        assert_eq!(calls[0].name, "archive_project");
        assert_eq!(calls[0].arguments, args);
    }

    #[tokio::test]
    async fn test_scoped_invoker() {
        let fx = fixture(WorkflowMode::Agile);
        let invoker = fx.executor.scoped(scope());
        let result = invoker.invoke(&call("get_tasks", json!({}))).await;
        assert!(result.success);
        assert_eq!(fx.executor.logger().recent(1)[0].session_id, "session-1");
    }
}
