//! OpenAI-compatible Provider
//!
//! Chat-completions adapter shared by OpenAI, DeepSeek and GLM. The three
//! backends speak the same function-calling protocol and differ only in
//! endpoint, credential and default model.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::continuation::{run_tool_loop, Conversation, ModelTurn, MAX_TOOL_ITERATIONS};
use super::provider::{
    missing_api_key_error, parse_http_error, transport_error, ChatProvider, ChatRequest,
    ToolInvoker,
};
use super::translator::to_openai_tools;
use super::types::{
    ChatMessage, ChatOutcome, ChatRole, LlmError, LlmResult, ProviderConfig,
    ProviderConfigUpdate, ProviderType, ToolCall, ToolInvocationResult,
};
use crate::http_client::{build_http_client, DEFAULT_HTTP_TIMEOUT};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/chat/completions";
const GLM_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

/// Backend-specific constants for a chat-completions endpoint.
#[derive(Debug, Clone, Copy)]
struct CompatProfile {
    provider: ProviderType,
    name: &'static str,
    default_url: &'static str,
}

impl CompatProfile {
    fn for_provider(provider: ProviderType) -> Option<Self> {
        let (name, default_url) = match provider {
            ProviderType::OpenAI => ("openai", OPENAI_API_URL),
            ProviderType::DeepSeek => ("deepseek", DEEPSEEK_API_URL),
            ProviderType::Glm => ("glm", GLM_API_URL),
            ProviderType::Anthropic => return None,
        };
        Some(Self {
            provider,
            name,
            default_url,
        })
    }
}

/// Provider for any backend speaking the chat-completions protocol.
pub struct OpenAICompatibleProvider {
    profile: CompatProfile,
    config: RwLock<ProviderConfig>,
    client: reqwest::Client,
    max_iterations: usize,
}

impl OpenAICompatibleProvider {
    /// Create an adapter for `config.provider`.
    ///
    /// Returns `None` for providers that do not speak this protocol.
    pub fn new(config: ProviderConfig) -> Option<Self> {
        let profile = CompatProfile::for_provider(config.provider)?;
        Some(Self::build(profile, config))
    }

    pub fn openai(config: ProviderConfig) -> Self {
        Self::with_profile(ProviderType::OpenAI, config)
    }

    pub fn deepseek(config: ProviderConfig) -> Self {
        Self::with_profile(ProviderType::DeepSeek, config)
    }

    pub fn glm(config: ProviderConfig) -> Self {
        Self::with_profile(ProviderType::Glm, config)
    }

    /// Adapter whose credential is read from the provider's environment key.
    pub fn from_env(provider: ProviderType) -> Option<Self> {
        Self::new(ProviderConfig::from_env(provider))
    }

    fn with_profile(provider: ProviderType, mut config: ProviderConfig) -> Self {
        config.provider = provider;
        let profile = CompatProfile::for_provider(provider).unwrap_or(CompatProfile {
            provider: ProviderType::OpenAI,
            name: "openai",
            default_url: OPENAI_API_URL,
        });
        Self::build(profile, config)
    }

    fn build(profile: CompatProfile, config: ProviderConfig) -> Self {
        Self {
            profile,
            config: RwLock::new(config),
            client: build_http_client(DEFAULT_HTTP_TIMEOUT),
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    fn read_config(&self) -> ProviderConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Convert a retained history message to chat-completions framing.
///
/// Tool messages in retained history have no matching call id, so they
/// are replayed as user content.
fn history_to_openai(message: &ChatMessage) -> Value {
    let role = match message.role {
        ChatRole::User | ChatRole::Tool => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::System => "system",
    };
    json!({ "role": role, "content": message.content })
}

fn build_messages(request: &ChatRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(request.history.iter().map(history_to_openai));
    messages.push(json!({ "role": "user", "content": request.message }));
    messages
}

struct OpenAIConversation<'a> {
    client: &'a reqwest::Client,
    provider: &'static str,
    url: String,
    api_key: String,
    body: Value,
    messages: Vec<Value>,
}

#[async_trait]
impl<'a> Conversation for OpenAIConversation<'a> {
    async fn next_turn(&mut self) -> LlmResult<ModelTurn> {
        let mut body = self.body.clone();
        body["messages"] = Value::Array(self.messages.clone());

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(transport_error)?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, self.provider));
        }

        let raw: Value = serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse response: {}", e),
        })?;
        let parsed: CompletionResponse =
            serde_json::from_value(raw.clone()).map_err(|e| LlmError::ParseError {
                message: format!("Unexpected response shape: {}", e),
            })?;

        Ok(parse_turn(parsed).with_raw(raw))
    }

    fn record_tool_round(&mut self, turn: &ModelTurn, results: &[(ToolCall, ToolInvocationResult)]) {
        let tool_calls: Vec<Value> = turn
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
        self.messages.push(json!({
            "role": "assistant",
            "content": turn.text,
            "tool_calls": tool_calls,
        }));
        for (call, result) in results {
            self.messages.push(json!({
                "role": "tool",
                "tool_call_id": call.id,
                "content": result.to_content(),
            }));
        }
    }
}

fn parse_turn(response: CompletionResponse) -> ModelTurn {
    let Some(message) = response.choices.into_iter().next().and_then(|c| c.message) else {
        return ModelTurn::default();
    };

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(idx, tc)| {
            let arguments = match tc.function.arguments.trim() {
                "" => json!({}),
                text => serde_json::from_str(text).unwrap_or(Value::Null),
            };
            ToolCall {
                id: tc.id.unwrap_or_else(|| format!("call_{}", idx)),
                name: tc.function.name,
                arguments,
            }
        })
        .collect();

    ModelTurn {
        text: message.content,
        tool_calls,
        raw: Value::Null,
    }
}

#[async_trait]
impl ChatProvider for OpenAICompatibleProvider {
    fn provider_type(&self) -> ProviderType {
        self.profile.provider
    }

    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn is_configured(&self) -> bool {
        self.read_config().is_configured()
    }

    fn configure(&self, update: ProviderConfigUpdate) {
        self.config
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .apply_update(update);
    }

    fn model(&self) -> String {
        self.read_config().model
    }

    fn config(&self) -> ProviderConfig {
        self.read_config()
    }

    async fn chat(&self, request: ChatRequest, tools: &dyn ToolInvoker) -> LlmResult<ChatOutcome> {
        let config = self.read_config();
        let api_key = config
            .api_key
            .clone()
            .filter(|_| config.is_configured())
            .ok_or_else(|| missing_api_key_error(self.profile.name))?;

        let mut body = json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(to_openai_tools(&request.tools));
            body["tool_choice"] = json!("auto");
        }

        tracing::info!(
            provider = self.profile.name,
            model = %config.model,
            tools = request.tools.len(),
            history = request.history.len(),
            "sending chat request"
        );

        let mut conversation = OpenAIConversation {
            client: &self.client,
            provider: self.profile.name,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| self.profile.default_url.to_string()),
            api_key,
            body,
            messages: build_messages(&request),
        };
        run_tool_loop(&mut conversation, tools, self.max_iterations).await
    }
}

// Response wire types

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
