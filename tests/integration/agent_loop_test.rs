//! Orchestration Loop Integration Tests
//!
//! Drives `CommandAgent::process_command` end to end with a scripted
//! provider and the in-memory workspace.

use std::sync::Arc;

use serde_json::json;
use taskpilot::storage::MemoryKeyValueStore;
use taskpilot::{ErrorCategory, InMemoryWorkspace};
use taskpilot_core::{ActionSource, Theme, WorkflowMode};
use taskpilot_llm::{ChatProvider, LlmError, ProviderType, ScriptedProvider};
use taskpilot_tools::CONTROL_TOOLS;

use crate::common::Harness;

// ============================================================================
// Control tools and the action bus
// ============================================================================

#[tokio::test]
async fn test_switch_to_dark_mode() {
    let h = Harness::new();
    h.provider
        .push_tool_call("set_theme", json!({"theme": "dark"}))
        .push_text("Switched to dark mode.");

    let result = h
        .agent
        .process_command("Switch to dark mode", ActionSource::Voice)
        .await;

    assert!(result.success);
    assert!(result.response.contains("dark"));
    assert_eq!(result.tools_called, vec!["set_theme"]);
    assert_eq!(h.provider.chat_calls(), 1);
    assert_eq!(h.action_types(), vec!["set_theme"]);
    assert!(h.workspace.registry_calls().is_empty());

    // The bridge applied the effect after the action was published.
    assert_eq!(h.workspace.ui().theme, Theme::Dark);
    let actions = h.actions.lock().unwrap();
    assert_eq!(actions[0].source, ActionSource::Voice);
}

#[tokio::test]
async fn test_control_tools_never_reach_registry() {
    let h = Harness::new();
    let args = [
        json!({"page": "board"}),
        json!({}),
        json!({}),
        json!({}),
        json!({"mode": "itsm"}),
        json!({"theme": "light"}),
        json!({"task_id": "task-2"}),
        json!({"message": "Hello"}),
    ];
    for (name, arguments) in CONTROL_TOOLS.iter().zip(args) {
        h.provider.push_tool_call(name, arguments);
    }
    h.provider.push_text("Done with the interface.");

    // The loop cap is 5 requests, so split the calls over two commands.
    let first = h.agent.process_command("do ui things", ActionSource::Terminal).await;
    let second = h.agent.process_command("and more", ActionSource::Terminal).await;

    assert!(first.success && second.success);
    assert!(h.workspace.registry_calls().is_empty());
    assert_eq!(h.action_types().len(), CONTROL_TOOLS.len());
    assert_eq!(h.workspace.snapshot().workflow_mode, WorkflowMode::Itsm);
    assert_eq!(h.workspace.ui().highlighted_task.as_deref(), Some("task-2"));
}

#[tokio::test]
async fn test_invalid_control_argument_is_a_failed_result() {
    let h = Harness::new();
    h.provider
        .push_tool_call("set_theme", json!({"theme": "neon"}))
        .push_text("Okay.");

    let result = h.agent.process_command("neon theme", ActionSource::Terminal).await;

    assert!(result.success);
    assert!(!result.tool_results[0].success);
    assert!(result.response.contains("set_theme failed"));
    assert!(result.response.contains("light, dark, system"));
    assert!(h.action_types().is_empty());
}

// ============================================================================
// Domain tools and validation
// ============================================================================

#[tokio::test]
async fn test_unknown_column_is_rejected_with_alternatives() {
    let h = Harness::new();
    h.provider
        .push_tool_call(
            "create_task",
            json!({"title": "Release notes", "priority": "high", "status": "ready"}),
        )
        .push_text("I tried to create the task.");

    let result = h
        .agent
        .process_command(
            "Create a high priority task for release notes and put it in ready",
            ActionSource::Terminal,
        )
        .await;

    assert!(!result.tool_results[0].success);
    assert!(result.response.contains("Column 'ready' does not exist in agile mode"));
    assert!(result
        .response
        .contains("Valid columns: backlog, todo, in_progress, review, done"));
    assert!(h.workspace.registry_calls().is_empty());
    assert!(h.workspace.snapshot().task_by_title("Release notes").is_none());
}

#[tokio::test]
async fn test_status_is_canonicalized_before_forwarding() {
    let h = Harness::new();
    h.provider
        .push_tool_call("create_task", json!({"title": "Review PR", "status": "In Progress"}))
        .push_text("Created.");

    let result = h.agent.process_command("add review task", ActionSource::Api).await;

    assert!(result.tool_results[0].success);
    let task = h.workspace.snapshot().task_by_title("Review PR").cloned().unwrap();
    assert_eq!(task.status, "in_progress");
}

#[tokio::test]
async fn test_tool_invalid_in_mode_names_valid_modes() {
    let h = Harness::new();
    h.provider
        .push_tool_call("create_incident", json!({"title": "Outage"}))
        .push_text("Done.");

    let result = h.agent.process_command("open an incident", ActionSource::Terminal).await;

    let failure = &result.tool_results[0];
    assert!(!failure.success);
    assert!(failure.message.contains("not available in agile mode"));
    assert!(failure.message.contains("itsm"));
    assert!(h.workspace.registry_calls().is_empty());
}

#[tokio::test]
async fn test_restricted_tools_are_not_offered_but_are_named() {
    let h = Harness::new();
    h.provider.push_text("Hi.");

    h.agent.process_command("hello", ActionSource::Terminal).await;

    let request = h.provider.requests().remove(0);
    assert!(request.tools.iter().all(|t| t.name != "create_incident"));
    assert!(request.tools.iter().any(|t| t.name == "set_theme"));
    let system = request.system.unwrap();
    assert!(system.contains("- create_incident (valid in: ITSM)"));
}

// ============================================================================
// Termination and failures
// ============================================================================

#[tokio::test]
async fn test_loop_stops_at_five_iterations() {
    let h = Harness::new();
    h.provider.always_call_tool("get_tasks", json!({}));

    let result = h.agent.process_command("list forever", ActionSource::Terminal).await;

    assert!(result.success);
    assert_eq!(result.iterations, 5);
    assert_eq!(h.provider.model_turns(), 5);
    assert_eq!(h.provider.chat_calls(), 1);
    assert_eq!(h.workspace.registry_calls().len(), 5);
    assert!(result.response.contains("I stopped after 5 model requests"));
    assert!(result.response.contains("5 tool call(s) were executed"));
    assert!(!h.agent.session().history()[0].success);
}

#[tokio::test]
async fn test_empty_model_reply_is_not_reported_blank() {
    let h = Harness::new();
    h.provider.push_text("");

    let result = h.agent.process_command("hello?", ActionSource::Terminal).await;

    assert!(result.success);
    assert_eq!(result.response, "The model returned no answer.");
}

#[tokio::test]
async fn test_empty_reply_after_tool_lists_what_ran() {
    let h = Harness::new();
    h.provider
        .push_tool_call("set_theme", json!({"theme": "dark"}))
        .push_text("");

    let result = h.agent.process_command("go dark", ActionSource::Terminal).await;

    assert!(result.response.starts_with("The model returned no answer."));
    assert!(result.response.contains("- set_theme succeeded"));
}

#[tokio::test]
async fn test_unconfigured_provider_fails_as_missing_credential() {
    let h = Harness::with_parts(
        InMemoryWorkspace::seeded(),
        Arc::new(MemoryKeyValueStore::new()),
        ScriptedProvider::unconfigured(ProviderType::Anthropic),
    );

    let result = h.agent.process_command("hello", ActionSource::Terminal).await;

    assert!(!result.success);
    assert_eq!(result.provider, Some(ProviderType::Anthropic));
    let error = result.error.unwrap();
    assert_eq!(error.category, ErrorCategory::MissingCredential);
    assert!(error.message.contains("ANTHROPIC_API_KEY"));
    assert_eq!(h.provider.model_turns(), 0);
    assert!(h.agent.session().history().is_empty());
    assert_eq!(h.agent.session().last_error(), Some(error.raw));
}

#[tokio::test]
async fn test_falls_back_to_first_configured_provider() {
    let h = Harness::with_parts(
        InMemoryWorkspace::seeded(),
        Arc::new(MemoryKeyValueStore::new()),
        ScriptedProvider::new(ProviderType::DeepSeek),
    );
    h.agent.session().set_active_provider(Some(ProviderType::OpenAI));
    h.provider.push_text("Hello from the fallback.");

    let result = h.agent.process_command("hi", ActionSource::Terminal).await;

    assert_eq!(result.provider, Some(ProviderType::DeepSeek));
    assert_eq!(result.response, "Hello from the fallback.");
}

#[tokio::test]
async fn test_configure_enables_provider() {
    let h = Harness::with_parts(
        InMemoryWorkspace::seeded(),
        Arc::new(MemoryKeyValueStore::new()),
        ScriptedProvider::unconfigured(ProviderType::Glm),
    );
    assert!(!h.provider.is_configured());
    assert!(h
        .agent
        .configure_provider(ProviderType::Glm, taskpilot_llm::ProviderConfigUpdate::api_key("k")));
    h.provider.push_text("Ready.");

    let result = h.agent.process_command("status", ActionSource::Terminal).await;
    assert_eq!(result.provider, Some(ProviderType::Glm));
    assert!(result.success);
}

#[tokio::test]
async fn test_transport_errors_are_classified() {
    let cases = [
        (
            LlmError::NetworkError {
                message: "connection refused".into(),
            },
            ErrorCategory::Network,
        ),
        (
            LlmError::RateLimited {
                message: "slow down".into(),
                retry_after: Some(3),
            },
            ErrorCategory::RateLimited,
        ),
        (
            LlmError::ParseError {
                message: "unexpected token".into(),
            },
            ErrorCategory::Unknown,
        ),
    ];
    for (error, category) in cases {
        let h = Harness::new();
        h.provider.push_error(error.clone());
        let result = h.agent.process_command("hello", ActionSource::Terminal).await;
        assert!(!result.success);
        let reported = result.error.unwrap();
        assert_eq!(reported.category, category);
        assert_eq!(reported.raw, error.to_string());
        assert_eq!(result.response, reported.message);
    }
}

#[tokio::test]
async fn test_empty_command_is_not_sent() {
    let h = Harness::new();
    let result = h.agent.process_command("   ", ActionSource::Terminal).await;
    assert!(!result.success);
    assert_eq!(h.provider.chat_calls(), 0);
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_pairs_sent_with_next_command() {
    let h = Harness::new();
    h.provider.push_text("First answer.").push_text("Second answer.");

    h.agent.process_command("first", ActionSource::Terminal).await;
    h.agent.process_command("second", ActionSource::Terminal).await;

    let requests = h.provider.requests();
    assert!(requests[0].history.is_empty());
    let history: Vec<&str> = requests[1].history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(history, vec!["first", "First answer."]);

    let entries = h.agent.session().history();
    assert_eq!(entries[0].input, "second");
    assert!(entries[0].success);
}
