//! Prompt Compiler
//!
//! Pure function from a [`ContextSnapshot`] and the tool availability of
//! its workflow mode to the system instruction text. No clock, no I/O:
//! the same inputs always produce the same prompt.

use taskpilot_core::{ContextSnapshot, WorkflowMode};
use taskpilot_tools::ToolAvailability;

const PREAMBLE: &str = "You are TaskPilot, the command assistant of a project-management \
application. You turn the user's natural-language commands into tool calls. Keep answers \
short and state plainly what you did.";

const RULES: &str = "## Rules
- Use the provided tools for every change. Never describe a change you did not make with a tool.
- If a tool result reports a failure, say that it failed and why. Never claim success for a failed step.
- If a tool result carries a [verification] note, tell the user the change could not be confirmed.
- UI tools (navigate, go_back, open_terminal, close_terminal, change_workflow_mode, set_theme, highlight_task, show_toast) take effect in the interface right after you call them.
- When a request is ambiguous, ask one short clarifying question instead of guessing.";

/// Compile the system prompt for one command.
pub fn compile_prompt(snapshot: &ContextSnapshot, tools: &ToolAvailability) -> String {
    let mut out = String::with_capacity(2048);
    out.push_str(PREAMBLE);
    out.push_str("\n\n");

    write_context(&mut out, snapshot);
    write_workflow(&mut out, snapshot);
    write_tools(&mut out, tools);
    out.push_str(RULES);
    out.push('\n');
    out
}

fn write_context(out: &mut String, s: &ContextSnapshot) {
    out.push_str("## Current context\n");
    if s.degraded {
        out.push_str("- Note: the application state could not be read; details below are defaults.\n");
    }
    out.push_str(&format!("- Page: {}\n", s.current_page));
    match (&s.authenticated, &s.user_name) {
        (true, Some(name)) => {
            out.push_str(&format!("- User: {} (signed in)\n", name));
        }
        (true, None) => out.push_str("- User: signed in\n"),
        (false, _) => out.push_str("- User: not signed in\n"),
    }
    if !s.projects.is_empty() {
        out.push_str(&format!("- Projects: {}\n", s.projects.join(", ")));
    }
    out.push_str(&format!(
        "- Current project: {}\n",
        s.current_project.as_deref().unwrap_or("none")
    ));

    let counts = &s.task_counts;
    let by_status = counts
        .by_status
        .iter()
        .map(|(status, n)| format!("{} {}", n, status))
        .collect::<Vec<_>>()
        .join(", ");
    if by_status.is_empty() {
        out.push_str(&format!("- Tasks: {} total\n", counts.total));
    } else {
        out.push_str(&format!("- Tasks: {} total ({})\n", counts.total, by_status));
    }
    out.push_str(&format!("- High priority tasks: {}\n", counts.high_priority));
    if !s.recent_tasks.is_empty() {
        out.push_str(&format!("- Recently updated: {}\n", s.recent_tasks.join("; ")));
    }
    out.push_str(&format!("- Unread notifications: {}\n", s.unread_notifications));

    let selection = &s.selection;
    if !selection.is_empty() {
        out.push_str("- Selected:");
        if let Some(task) = &selection.task {
            out.push_str(&format!(" task \"{}\";", task));
        }
        if let Some(email) = &selection.email {
            out.push_str(&format!(" email \"{}\";", email));
        }
        if let Some(incident) = &selection.incident {
            out.push_str(&format!(" incident \"{}\";", incident));
        }
        out.push('\n');
    }

    if !s.recent_actions.is_empty() {
        out.push_str("- Recent actions:\n");
        for action in &s.recent_actions {
            let status = if action.success { "ok" } else { "failed" };
            out.push_str(&format!("  - {} ({}): {}\n", action.action_type, status, action.summary));
        }
    }
    if !s.memory.is_empty() {
        out.push_str("- Remembered:\n");
        for (key, value) in &s.memory {
            out.push_str(&format!("  - {}: {}\n", key, value));
        }
    }
    out.push('\n');
}

fn write_workflow(out: &mut String, s: &ContextSnapshot) {
    out.push_str(&format!(
        "## Workflow\nActive mode: {} ({})\n",
        s.workflow_mode.label(),
        s.workflow_mode
    ));
    out.push_str(&format!("Valid task columns: {}\n", s.workflow_columns.join(", ")));
    out.push_str(
        "Only these column identifiers are valid for a task status. If the user names a column \
that is not in this list, do not pick a different one silently: tell the user the column does \
not exist in this mode and list the valid columns.\n\n",
    );
}

fn write_tools(out: &mut String, tools: &ToolAvailability) {
    out.push_str("## Tools\n");
    let names = tools
        .available
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("Available now: {}\n", names));

    if !tools.restricted.is_empty() {
        out.push_str(&format!(
            "Not valid in the current context ({} mode). Do not call them; if the user asks, explain which mode they need:\n",
            tools.mode
        ));
        for tool in &tools.restricted {
            let modes = tool
                .valid_modes
                .iter()
                .map(WorkflowMode::label)
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("- {} (valid in: {})\n", tool.name, modes));
        }
    }
    out.push('\n');
}
