//! Dispatch errors raised before a tool reaches its handler.
//!
//! These never escape the executor as `Err`: each is rendered into a failed
//! [`crate::ToolOutcome`] so the model sees a readable explanation.

use taskpilot_core::WorkflowMode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("The tool '{tool}' is not available in {mode} mode. It can be used in: {valid_modes}.")]
    InvalidInMode {
        tool: String,
        mode: WorkflowMode,
        valid_modes: String,
    },

    #[error("The tool '{tool}' is missing required argument(s): {}.", missing.join(", "))]
    MissingArguments { tool: String, missing: Vec<String> },

    #[error("Column '{column}' does not exist in {mode} mode. Valid columns: {valid}.")]
    InvalidColumn {
        column: String,
        mode: WorkflowMode,
        valid: String,
    },

    #[error("Invalid argument for '{tool}': {message}")]
    InvalidArgument { tool: String, message: String },

    #[error("Unknown control tool: {0}")]
    UnknownControl(String),
}

impl ToolError {
    pub fn invalid_argument(tool: &str, message: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_column(column: &str, mode: WorkflowMode) -> Self {
        ToolError::InvalidColumn {
            column: column.to_string(),
            mode,
            valid: mode.column_list(),
        }
    }
}

impl From<ToolError> for String {
    fn from(error: ToolError) -> Self {
        error.to_string()
    }
}
