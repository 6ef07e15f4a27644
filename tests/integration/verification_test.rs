//! Verification Integration Tests
//!
//! The registry acknowledges a write, the store disagrees: the result
//! keeps its success flag and carries a discrepancy note.

use serde_json::json;
use taskpilot_core::ActionSource;

use crate::common::Harness;

#[tokio::test]
async fn test_created_task_missing_on_reread() {
    let h = Harness::new();
    h.workspace.set_ack_without_applying(true);
    h.provider
        .push_tool_call("create_task", json!({"title": "Fix bug"}))
        .push_text("I created the task 'Fix bug'.");

    let result = h.agent.process_command("Create a task Fix bug", ActionSource::Terminal).await;

    assert!(result.success);
    let tool = &result.tool_results[0];
    assert!(tool.success, "verification never flips the reported success");
    assert!(tool.message.contains("[verification] Task 'Fix bug' could not be found"));
    assert!(result.response.contains("[verification]"));

    let entry = h.agent.logger().recent(1).remove(0);
    assert_eq!(entry.action_type, "create_task");
    assert!(entry.result.success);
    assert_eq!(entry.verified, Some(false));
}

#[tokio::test]
async fn test_update_not_applied_reports_field_mismatch() {
    let h = Harness::new();
    h.workspace.set_ack_without_applying(true);
    h.provider
        .push_tool_call("update_task", json!({"task_id": "task-3", "status": "done"}))
        .push_text("Moved it to done.");

    let result = h.agent.process_command("finish the docs task", ActionSource::Terminal).await;

    assert!(result.tool_results[0].success);
    assert!(result
        .response
        .contains("[verification] Task 'Write onboarding docs' does not match the requested change: status is 'todo' (expected 'done')."));
    assert_eq!(h.agent.logger().recent(1)[0].verified, Some(false));
}

#[tokio::test]
async fn test_applied_write_is_verified() {
    let h = Harness::new();
    h.provider
        .push_tool_call("update_task", json!({"task_id": "task-3", "priority": "urgent"}))
        .push_text("Raised the priority.");

    let result = h.agent.process_command("make docs urgent", ActionSource::Terminal).await;

    assert_eq!(result.response, "Raised the priority.");
    assert_eq!(h.agent.logger().recent(1)[0].verified, Some(true));
}

#[tokio::test]
async fn test_tools_outside_allow_list_are_not_verified() {
    let h = Harness::new();
    h.workspace.set_ack_without_applying(true);
    h.provider
        .push_tool_call("delete_task", json!({"task_id": "task-1"}))
        .push_text("Deleted.");

    h.agent.process_command("delete the CI task", ActionSource::Terminal).await;

    assert_eq!(h.agent.logger().recent(1)[0].verified, None);
}
