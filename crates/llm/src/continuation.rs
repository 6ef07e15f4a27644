//! Tool-call continuation
//!
//! Backend-independent driver for the request / tool-call / tool-result
//! cycle. Each backend supplies a [`Conversation`] that knows its own
//! message framing; this module owns the iteration bound and the summary
//! returned when the bound is hit.

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::ToolInvoker;
use crate::types::{ChatOutcome, ExecutedTool, LlmResult, ToolCall, ToolInvocationResult};

/// Maximum number of model requests per chat.
pub const MAX_TOOL_ITERATIONS: usize = 5;

/// One model reply.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Raw backend response body.
    pub raw: Value,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Default::default()
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().map(|t| !t.trim().is_empty()).unwrap_or(false)
    }
}

/// Backend-specific conversation state for one chat.
#[async_trait]
pub trait Conversation: Send {
    /// Send the conversation so far and return the model's reply.
    async fn next_turn(&mut self) -> LlmResult<ModelTurn>;

    /// Append the model's tool-call turn and the results of executing it,
    /// in the framing the backend expects.
    fn record_tool_round(&mut self, turn: &ModelTurn, results: &[(ToolCall, ToolInvocationResult)]);
}

/// Drive a conversation until the model stops requesting tools or
/// `max_iterations` requests have been made.
///
/// Tool calls within a turn run sequentially, in the order the model
/// listed them. Exhaustion is not an error: the outcome carries a summary
/// with the number of tools executed and any failures.
pub async fn run_tool_loop<C>(
    conversation: &mut C,
    tools: &dyn ToolInvoker,
    max_iterations: usize,
) -> LlmResult<ChatOutcome>
where
    C: Conversation + ?Sized,
{
    let max_iterations = max_iterations.max(1);
    let mut executed: Vec<ExecutedTool> = Vec::new();
    let mut last_text: Option<String> = None;
    let mut raw = Value::Null;

    for iteration in 1..=max_iterations {
        let turn = conversation.next_turn().await?;
        raw = turn.raw.clone();

        if turn.tool_calls.is_empty() {
            let response = if turn.has_text() {
                turn.text.clone().unwrap_or_default()
            } else {
                tracing::warn!(iteration, "model returned an empty final answer");
                empty_reply_summary(&executed)
            };
            return Ok(finish(response, executed, iteration, false, raw));
        }

        if turn.has_text() {
            last_text = turn.text.clone();
        }

        let mut results = Vec::with_capacity(turn.tool_calls.len());
        for call in &turn.tool_calls {
            tracing::debug!(tool = %call.name, iteration, "executing tool call");
            let result = tools.invoke(call).await;
            if !result.success {
                tracing::info!(tool = %call.name, message = %result.message, "tool call failed");
            }
            executed.push(ExecutedTool {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                success: result.success,
                message: result.message.clone(),
            });
            results.push((call.clone(), result));
        }
        conversation.record_tool_round(&turn, &results);
    }

    tracing::warn!(
        iterations = max_iterations,
        tools = executed.len(),
        "tool-call iteration cap reached"
    );
    let response = exhaustion_summary(last_text.as_deref(), &executed, max_iterations);
    Ok(finish(response, executed, max_iterations, true, raw))
}

fn finish(
    response: String,
    executed: Vec<ExecutedTool>,
    iterations: usize,
    exhausted: bool,
    raw: Value,
) -> ChatOutcome {
    ChatOutcome {
        response,
        tools_called: executed.iter().map(|t| t.name.clone()).collect(),
        tool_results: executed,
        iterations,
        exhausted,
        raw,
    }
}

/// Stand-in for a blank final answer so the caller always gets something
/// to show.
fn empty_reply_summary(executed: &[ExecutedTool]) -> String {
    let mut summary = String::from("The model returned no answer.");
    if executed.is_empty() {
        return summary;
    }
    summary.push_str(" Tools executed:");
    for tool in executed {
        let detail = tool.message.lines().next().unwrap_or_default().trim();
        match (tool.success, detail.is_empty()) {
            (true, _) => summary.push_str(&format!("\n- {} succeeded", tool.name)),
            (false, true) => summary.push_str(&format!("\n- {} failed (no details given)", tool.name)),
            (false, false) => summary.push_str(&format!("\n- {} failed: {}", tool.name, detail)),
        }
    }
    summary
}

fn exhaustion_summary(
    last_text: Option<&str>,
    executed: &[ExecutedTool],
    iterations: usize,
) -> String {
    let mut summary = String::new();
    if let Some(text) = last_text {
        summary.push_str(text.trim());
        summary.push_str("\n\n");
    }
    let failed: Vec<&ExecutedTool> = executed.iter().filter(|t| !t.success).collect();
    summary.push_str(&format!(
        "I stopped after {} model requests without a final answer. {} tool call(s) were executed ({} succeeded, {} failed).",
        iterations,
        executed.len(),
        executed.len() - failed.len(),
        failed.len()
    ));
    for tool in failed {
        summary.push_str(&format!("\n- {} failed: {}", tool.name, tool.message));
    }
    summary
}
