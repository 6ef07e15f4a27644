//! TaskPilot LLM
//!
//! Uniform chat adapters over several language-model backends:
//! - Anthropic Claude (Messages API)
//! - OpenAI
//! - DeepSeek
//! - GLM (ZhipuAI)
//!
//! Every adapter runs the backend's tool-call continuation protocol itself,
//! executing requested tools through a caller-supplied [`ToolInvoker`].

use std::sync::Arc;
use std::time::Duration;

pub mod anthropic;
pub mod continuation;
pub mod http_client;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod translator;
pub mod types;

// Re-export main types
pub use anthropic::AnthropicProvider;
pub use continuation::{run_tool_loop, Conversation, ModelTurn, MAX_TOOL_ITERATIONS};
pub use http_client::{build_http_client, DEFAULT_HTTP_TIMEOUT};
#[cfg(any(test, feature = "mock"))]
pub use mock::ScriptedProvider;
pub use openai::OpenAICompatibleProvider;
pub use provider::{ChatProvider, ChatRequest, ToolInvoker};
pub use translator::{to_anthropic_tools, to_openai_tools, translate, ToolDialect};
pub use types::*;

/// Build the adapter for `config.provider`.
pub fn create_provider(
    config: ProviderConfig,
    http_timeout: Duration,
    max_iterations: usize,
) -> Arc<dyn ChatProvider> {
    match config.provider {
        ProviderType::Anthropic => Arc::new(
            AnthropicProvider::new(config)
                .with_http_timeout(http_timeout)
                .with_max_iterations(max_iterations),
        ),
        ProviderType::OpenAI => Arc::new(
            OpenAICompatibleProvider::openai(config)
                .with_http_timeout(http_timeout)
                .with_max_iterations(max_iterations),
        ),
        ProviderType::DeepSeek => Arc::new(
            OpenAICompatibleProvider::deepseek(config)
                .with_http_timeout(http_timeout)
                .with_max_iterations(max_iterations),
        ),
        ProviderType::Glm => Arc::new(
            OpenAICompatibleProvider::glm(config)
                .with_http_timeout(http_timeout)
                .with_max_iterations(max_iterations),
        ),
    }
}
