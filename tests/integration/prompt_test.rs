//! Prompt Compilation Integration Tests

use std::collections::BTreeMap;
use std::sync::Arc;

use taskpilot::services::context_builder::ContextBuilder;
use taskpilot::services::prompt::compile_prompt;
use taskpilot::InMemoryWorkspace;
use taskpilot_core::WorkflowMode;
use taskpilot_tools::{ActionLogger, ToolAvailability};

#[test]
fn test_same_snapshot_same_prompt() {
    let workspace = Arc::new(InMemoryWorkspace::seeded());
    let builder = ContextBuilder::new(workspace, Arc::new(ActionLogger::default()));
    let snapshot = builder.build(&BTreeMap::new());
    let tools = ToolAvailability::for_mode(snapshot.workflow_mode);

    let first = compile_prompt(&snapshot, &tools);
    let second = compile_prompt(&snapshot.clone(), &tools);
    assert_eq!(first, second);
    assert!(first.contains("Current project: Website"));
    assert!(first.contains("Tasks: 3 total (1 done, 1 in_progress, 1 todo)"));
}

#[test]
fn test_prompt_follows_workflow_mode() {
    let workspace = Arc::new(InMemoryWorkspace::seeded());
    workspace.set_workflow_mode(WorkflowMode::Ccaas);
    let builder = ContextBuilder::new(workspace, Arc::new(ActionLogger::default()));
    let snapshot = builder.build(&BTreeMap::new());

    let prompt = compile_prompt(&snapshot, &ToolAvailability::for_mode(snapshot.workflow_mode));
    assert!(prompt.contains("Active mode: CCaaS (ccaas)"));
    assert!(prompt.contains("Valid task columns: new, assigned, in_progress, waiting_on_customer, resolved"));
    assert!(prompt.contains("- create_incident (valid in: ITSM)"));
    assert!(!prompt.contains("- get_emails (valid in"));
}
