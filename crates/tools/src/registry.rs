//! Tool Registry contract
//!
//! The external collaborator that performs domain mutations. The executor
//! forwards every non-control tool call here and returns its result as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskpilot_llm::{ToolCall, ToolInvocationResult};

/// Result of executing a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutcome {
    /// Create a successful result
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error result
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<ToolOutcome> for ToolInvocationResult {
    fn from(outcome: ToolOutcome) -> Self {
        ToolInvocationResult {
            success: outcome.success,
            message: outcome.message,
            data: outcome.data,
        }
    }
}

/// Performs domain tool calls (`{function, arguments} -> {success, message, data?}`).
///
/// Failures are reported through `ToolOutcome::success`, never by panicking.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn execute_tool(&self, call: &ToolCall) -> ToolOutcome;
}
