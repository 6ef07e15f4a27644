//! Chat Provider Trait
//!
//! Defines the common interface for all chat backends and the callback
//! through which backends execute the tool calls a model requests.

use async_trait::async_trait;

use super::types::{
    ChatMessage, ChatOutcome, LlmError, LlmResult, ProviderConfig, ProviderConfigUpdate,
    ProviderType, ToolCall, ToolDefinition, ToolInvocationResult,
};

/// Executes one tool call on behalf of a provider.
///
/// Implementations never fail: problems are reported as an unsuccessful
/// [`ToolInvocationResult`] so the model can react to them.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, call: &ToolCall) -> ToolInvocationResult;
}

/// One chat exchange sent to a provider.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub system: Option<String>,
    pub tools: Vec<ToolDefinition>,
    /// Prior turns, oldest first.
    pub history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Trait that all chat backends implement.
///
/// `chat` runs the whole tool-use exchange: it sends the request, executes
/// every requested tool through the invoker, feeds the results back, and
/// stops once the model answers with plain text or the iteration cap is hit.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Whether a credential is present. Checked before any network call.
    fn is_configured(&self) -> bool;

    /// Merge new settings into the adapter. Idempotent.
    fn configure(&self, update: ProviderConfigUpdate);

    /// Returns the current model being used.
    fn model(&self) -> String;

    /// Snapshot of the current configuration.
    fn config(&self) -> ProviderConfig;

    async fn chat(&self, request: ChatRequest, tools: &dyn ToolInvoker) -> LlmResult<ChatOutcome>;
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::NotConfigured {
        provider: provider.to_string(),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 | 404 | 422 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

/// Map a transport failure onto the error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::NetworkError {
            message: format!("request timed out: {}", err),
        }
    } else {
        LlmError::NetworkError {
            message: err.to_string(),
        }
    }
}
