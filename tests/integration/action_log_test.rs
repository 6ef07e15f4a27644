//! Action Log Integration Tests

use std::sync::Arc;

use serde_json::json;
use taskpilot::services::session::ACTION_LOG_KEY;
use taskpilot::storage::{KeyValueStore, MemoryKeyValueStore};
use taskpilot::InMemoryWorkspace;
use taskpilot_core::ActionSource;
use taskpilot_llm::{ProviderType, ScriptedProvider};
use taskpilot_tools::{ActionLogger, ToolOutcome, DEFAULT_LOG_CAPACITY};

use crate::common::Harness;

#[test]
fn test_501_entries_keep_newest_500() {
    let logger = ActionLogger::new(DEFAULT_LOG_CAPACITY);
    for i in 0..501 {
        logger.record("agent", "s-1", &format!("tool_{}", i), json!({}), ToolOutcome::ok("ok"));
    }

    let entries = logger.entries();
    assert_eq!(entries.len(), 500);
    assert_eq!(entries[0].action_type, "tool_1");
    assert_eq!(entries[499].action_type, "tool_500");
}

#[tokio::test]
async fn test_every_execution_is_logged_with_session() {
    let h = Harness::new();
    h.provider
        .push_tool_call("navigate", json!({"page": "board"}))
        .push_tool_call("get_tasks", json!({}))
        .push_text("Here is the board.");

    h.agent.process_command("show me the board", ActionSource::Terminal).await;

    let entries = h.agent.logger().entries();
    let types: Vec<&str> = entries.iter().map(|e| e.action_type.as_str()).collect();
    assert_eq!(types, vec!["navigate", "get_tasks"]);
    assert!(entries
        .iter()
        .all(|e| e.session_id == h.agent.session().session_id() && e.actor == "agent"));
}

#[tokio::test]
async fn test_log_persists_and_feeds_next_context() {
    let storage = Arc::new(MemoryKeyValueStore::new());
    let first = Harness::with_parts(
        InMemoryWorkspace::seeded(),
        storage.clone(),
        ScriptedProvider::new(ProviderType::Anthropic),
    );
    first
        .provider
        .push_tool_call("update_task", json!({"task_id": "missing"}))
        .push_text("Could not find it.");
    first.agent.process_command("update missing", ActionSource::Terminal).await;
    assert!(storage.get(ACTION_LOG_KEY).unwrap().is_some());

    let second = Harness::with_parts(
        InMemoryWorkspace::seeded(),
        storage,
        ScriptedProvider::new(ProviderType::Anthropic),
    );
    assert_eq!(second.agent.logger().len(), 1);
    second.provider.push_text("Ok.");
    second.agent.process_command("what happened", ActionSource::Terminal).await;

    let system = second.provider.requests()[0].system.clone().unwrap();
    assert!(system.contains("update_task (failed): Task 'missing' not found."));
}
