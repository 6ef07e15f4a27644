//! Command Result Models
//!
//! What `process_command` returns, including the user-facing failure
//! categories.

use serde::{Deserialize, Serialize};
use taskpilot_llm::{ExecutedTool, LlmError, ProviderType};

/// Fixed set of user-facing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    MissingCredential,
    Network,
    RateLimited,
    Unknown,
}

impl ErrorCategory {
    /// Classify a raw error message.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if any(&["rate limit", "too many requests", "429", "quota"]) {
            ErrorCategory::RateLimited
        } else if any(&["api key", "not configured", "credential", "unauthorized", "authentication"]) {
            ErrorCategory::MissingCredential
        } else if any(&["network", "timed out", "timeout", "connection", "dns", "unreachable"]) {
            ErrorCategory::Network
        } else {
            ErrorCategory::Unknown
        }
    }

    /// Friendly message shown instead of the raw error.
    pub fn friendly_message(&self, provider: Option<ProviderType>) -> String {
        match self {
            ErrorCategory::MissingCredential => match provider {
                Some(p) => format!(
                    "The {} provider is not set up. Add an API key (environment variable {}) or choose another provider.",
                    p,
                    p.credential_env_key()
                ),
                None => "No AI provider is set up. Add an API key or choose another provider."
                    .to_string(),
            },
            ErrorCategory::Network => {
                "I couldn't reach the AI service. Check your connection and try again.".to_string()
            }
            ErrorCategory::RateLimited => {
                "The AI service is receiving too many requests right now. Please wait a moment and try again.".to_string()
            }
            ErrorCategory::Unknown => {
                "Something went wrong while processing that command. Please try again.".to_string()
            }
        }
    }
}

impl From<&LlmError> for ErrorCategory {
    fn from(error: &LlmError) -> Self {
        match error {
            LlmError::RateLimited { .. } => ErrorCategory::RateLimited,
            LlmError::ServerError { status: Some(429), .. } => ErrorCategory::RateLimited,
            LlmError::NotConfigured { .. } | LlmError::AuthenticationFailed { .. } => {
                ErrorCategory::MissingCredential
            }
            LlmError::NetworkError { .. } => ErrorCategory::Network,
            other => ErrorCategory::classify(&other.to_string()),
        }
    }
}

/// Failure details of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandError {
    pub category: ErrorCategory,
    /// Friendly text, also used as the command response.
    pub message: String,
    /// Original error text, kept for diagnostics.
    pub raw: String,
}

/// Outcome of one `process_command` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub response: String,
    #[serde(default)]
    pub tools_called: Vec<String>,
    #[serde(default)]
    pub tool_results: Vec<ExecutedTool>,
    pub provider: Option<ProviderType>,
    #[serde(default)]
    pub iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResult {
    pub fn failure(provider: Option<ProviderType>, category: ErrorCategory, raw: impl Into<String>) -> Self {
        let message = category.friendly_message(provider);
        Self {
            success: false,
            response: message.clone(),
            tools_called: Vec::new(),
            tool_results: Vec::new(),
            provider,
            iterations: 0,
            error: Some(CommandError {
                category,
                message,
                raw: raw.into(),
            }),
        }
    }
}
