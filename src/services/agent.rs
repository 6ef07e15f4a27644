//! Orchestration Loop
//!
//! `CommandAgent::process_command` drives one natural-language command:
//! build the context, compile the prompt, hand the mode's tools and the
//! recent history to the active provider, then record the outcome.
//!
//! Concurrent calls are not serialized. History and the action log are
//! append-and-cap structures, so interleaved commands stay consistent but
//! are not strictly ordered. Callers wanting one command at a time should
//! check [`SessionState::is_processing`] first.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::json;
use taskpilot_core::{ActionBus, ActionSource, DomainStore};
use taskpilot_llm::{
    create_provider, ChatOutcome, ChatProvider, ChatRequest, ProviderConfig, ProviderConfigUpdate,
    ProviderType,
};
use taskpilot_tools::{
    ActionLogger, ExecutionScope, ToolAvailability, ToolExecutor, ToolOutcome, ToolRegistry,
    INTERNAL_ERROR_ACTION,
};

use crate::models::command::{CommandResult, ErrorCategory};
use crate::models::session::CommandHistoryEntry;
use crate::models::settings::AgentSettings;
use crate::services::context_builder::ContextBuilder;
use crate::services::prompt::compile_prompt;
use crate::services::session::SessionState;

const VERIFICATION_MARKER: &str = "[verification]";

pub struct CommandAgent {
    settings: AgentSettings,
    providers: BTreeMap<ProviderType, Arc<dyn ChatProvider>>,
    session: Arc<SessionState>,
    context: ContextBuilder,
    executor: ToolExecutor,
}

impl CommandAgent {
    /// Wire the agent. One adapter per backend is created from the
    /// environment; the action log is restored from the session storage.
    pub fn new(
        settings: AgentSettings,
        session: Arc<SessionState>,
        store: Arc<dyn DomainStore>,
        registry: Arc<dyn ToolRegistry>,
        bus: Arc<dyn ActionBus>,
    ) -> Self {
        let logger = Arc::new(ActionLogger::new(settings.action_log_capacity));
        logger.restore(session.load_action_log());

        let providers = ProviderType::FALLBACK_ORDER
            .iter()
            .map(|&provider| {
                let mut config = ProviderConfig::from_env(provider);
                if let Some(model) = settings.models.get(&provider) {
                    config.model = model.clone();
                }
                let adapter =
                    create_provider(config, settings.http_timeout(), settings.max_tool_iterations);
                (provider, adapter)
            })
            .collect();

        let context = ContextBuilder::new(store.clone(), logger.clone());
        let executor = ToolExecutor::new(registry, store, bus, logger, settings.verifier_config());

        Self {
            settings,
            providers,
            session,
            context,
            executor,
        }
    }

    /// Replace the adapter registered for the provider's type.
    pub fn with_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(provider.provider_type(), provider);
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn logger(&self) -> &Arc<ActionLogger> {
        self.executor.logger()
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn provider(&self, provider: ProviderType) -> Option<&Arc<dyn ChatProvider>> {
        self.providers.get(&provider)
    }

    /// Merge a configuration update into one adapter.
    pub fn configure_provider(&self, provider: ProviderType, update: ProviderConfigUpdate) -> bool {
        match self.providers.get(&provider) {
            Some(adapter) => {
                adapter.configure(update);
                true
            }
            None => false,
        }
    }

    /// Provider the next command will use.
    ///
    /// The session's choice (else the configured default) wins when it has a
    /// credential; otherwise the fallback order is walked. With nothing
    /// configured the documented default is returned and fails on use.
    pub fn resolve_provider(&self) -> Option<Arc<dyn ChatProvider>> {
        let preferred = self
            .session
            .active_provider()
            .or(self.settings.default_provider)
            .unwrap_or(ProviderType::DEFAULT);

        if let Some(adapter) = self.providers.get(&preferred).filter(|a| a.is_configured()) {
            return Some(adapter.clone());
        }
        if let Some(adapter) = self
            .settings
            .fallback_order
            .iter()
            .filter_map(|p| self.providers.get(p))
            .find(|a| a.is_configured())
        {
            tracing::info!(
                preferred = %preferred,
                provider = %adapter.provider_type(),
                "preferred provider not configured, using fallback"
            );
            return Some(adapter.clone());
        }
        self.providers.get(&ProviderType::DEFAULT).cloned()
    }

    /// Process one command. Never fails: every problem ends up in the
    /// returned [`CommandResult`].
    pub async fn process_command(&self, input: &str, source: ActionSource) -> CommandResult {
        let input = input.trim();
        if input.is_empty() {
            return CommandResult {
                success: false,
                response: "Please enter a command.".to_string(),
                tools_called: Vec::new(),
                tool_results: Vec::new(),
                provider: None,
                iterations: 0,
                error: None,
            };
        }

        self.session.begin_processing();
        let result = match AssertUnwindSafe(self.run(input, source)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => self.record_panic(input, source, panic),
        };
        self.session
            .finish_processing(result.error.as_ref().map(|e| e.raw.clone()));

        if let Err(e) = self.session.save_action_log(&self.logger().entries()) {
            tracing::warn!(error = %e, "failed to persist action log");
        }
        result
    }

    async fn run(&self, input: &str, source: ActionSource) -> CommandResult {
        let Some(provider) = self.resolve_provider() else {
            return CommandResult::failure(None, ErrorCategory::MissingCredential, "no provider registered");
        };
        let provider_type = provider.provider_type();

        let snapshot = self.context.build(&self.session.memory());
        let tools = ToolAvailability::for_mode(snapshot.workflow_mode);
        let system = compile_prompt(&snapshot, &tools);
        let history = self.session.recent_pairs(self.settings.history_pairs);

        tracing::info!(
            provider = %provider_type,
            model = %provider.model(),
            mode = %snapshot.workflow_mode,
            tools = tools.available.len(),
            history = history.len(),
            "processing command"
        );

        let request = ChatRequest::new(input)
            .with_system(system)
            .with_tools(tools.available)
            .with_history(history);
        let scope = ExecutionScope::new(self.session.session_id(), source);
        let invoker = self.executor.scoped(scope);

        match provider.chat(request, &invoker).await {
            Ok(outcome) => {
                let response = surface_tool_failures(&outcome);
                let clean = !outcome.exhausted && outcome.tool_results.iter().all(|t| t.success);
                self.session.push_history(CommandHistoryEntry::new(
                    input,
                    response.clone(),
                    clean,
                    outcome.tools_called.clone(),
                ));
                tracing::info!(
                    provider = %provider_type,
                    iterations = outcome.iterations,
                    tools = outcome.tools_called.len(),
                    exhausted = outcome.exhausted,
                    "command completed"
                );
                CommandResult {
                    success: true,
                    response,
                    tools_called: outcome.tools_called,
                    tool_results: outcome.tool_results,
                    provider: Some(provider_type),
                    iterations: outcome.iterations,
                    error: None,
                }
            }
            Err(e) => {
                let category = ErrorCategory::from(&e);
                tracing::warn!(provider = %provider_type, error = %e, category = ?category, "command failed");
                CommandResult::failure(Some(provider_type), category, e.to_string())
            }
        }
    }

    fn record_panic(
        &self,
        input: &str,
        source: ActionSource,
        panic: Box<dyn Any + Send>,
    ) -> CommandResult {
        let message = panic_message(panic.as_ref());
        tracing::error!(error = %message, "command processing panicked");
        self.logger().record(
            "agent",
            self.session.session_id(),
            INTERNAL_ERROR_ACTION,
            json!({ "input": input, "source": source }),
            ToolOutcome::err(message.clone()),
        );
        CommandResult::failure(None, ErrorCategory::Unknown, message)
    }
}

/// Append every tool failure and verification note the model text does
/// not already mention.
/// Shown when a provider produced neither text nor tool activity.
const NO_ANSWER: &str = "The model returned no answer.";

fn surface_tool_failures(outcome: &ChatOutcome) -> String {
    let mut response = outcome.response.trim().to_string();
    let mut notes: Vec<String> = Vec::new();

    for tool in &outcome.tool_results {
        let note = if !tool.success {
            let reason = tool.message.lines().next().unwrap_or_default().trim();
            if reason.is_empty() {
                format!("{} failed (no details given)", tool.name)
            } else if response.contains(reason) {
                continue;
            } else {
                format!("{} failed: {}", tool.name, reason)
            }
        } else if let Some(line) = tool.message.lines().find(|l| l.starts_with(VERIFICATION_MARKER)) {
            if response.contains(line) {
                continue;
            }
            line.to_string()
        } else {
            continue;
        };
        if !notes.contains(&note) {
            notes.push(note);
        }
    }

    if response.is_empty() && notes.is_empty() {
        response.push_str(NO_ANSWER);
    }

    if !notes.is_empty() {
        if !response.is_empty() {
            response.push_str("\n\n");
        }
        response.push_str("Note:\n");
        response.push_str(
            &notes
                .iter()
                .map(|n| format!("- {}", n))
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("internal error: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("internal error: {}", s)
    } else {
        "internal error".to_string()
    }
}
