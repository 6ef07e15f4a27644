//! Anthropic Provider
//!
//! Messages-API adapter. The system prompt travels in its own field,
//! roles must alternate, and tool results are returned as `tool_result`
//! blocks inside a user turn.

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
use super::translator::to_anthropic_tools;
use super::types::{
    ChatOutcome, ChatRole, LlmError, LlmResult, ProviderConfig, ProviderConfigUpdate,
    ProviderType, ToolCall, ToolInvocationResult,
};
use crate::http_client::{build_http_client, DEFAULT_HTTP_TIMEOUT};

/// Default Anthropic API endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    config: RwLock<ProviderConfig>,
    client: reqwest::Client,
    max_iterations: usize,
}

impl AnthropicProvider {
    pub fn new(mut config: ProviderConfig) -> Self {
        config.provider = ProviderType::Anthropic;
        Self {
            config: RwLock::new(config),
            client: build_http_client(DEFAULT_HTTP_TIMEOUT),
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    pub fn from_env() -> Self {
        Self::new(ProviderConfig::from_env(ProviderType::Anthropic))
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

/// Split a request into the system field and an alternating message list.
///
/// System-role history is folded into the system field; tool-role history
/// is replayed as user content. Consecutive same-role turns are merged.
fn build_messages(request: &ChatRequest) -> (Option<String>, Vec<Value>) {
    let mut system_parts: Vec<&str> = request.system.iter().map(String::as_str).collect();
    let mut turns: Vec<(&'static str, String)> = Vec::new();

    let mut push = |role: &'static str, content: &str| match turns.last_mut() {
        Some((last_role, text)) if *last_role == role => {
            text.push_str("\n\n");
            text.push_str(content);
        }
        _ => turns.push((role, content.to_string())),
    };

    for message in &request.history {
        match message.role {
            ChatRole::System => system_parts.push(&message.content),
            ChatRole::User | ChatRole::Tool => push("user", &message.content),
            ChatRole::Assistant => push("assistant", &message.content),
        }
    }
    push("user", &request.message);

    // The first turn must come from the user.
    if turns.first().map(|(role, _)| *role) == Some("assistant") {
        turns.remove(0);
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    let messages = turns
        .into_iter()
        .map(|(role, content)| json!({ "role": role, "content": content }))
        .collect();
    (system, messages)
}

struct AnthropicConversation<'a> {
    client: &'a reqwest::Client,
    url: String,
    api_key: String,
    body: Value,
    messages: Vec<Value>,
}

#[async_trait]
impl<'a> Conversation for AnthropicConversation<'a> {
    async fn next_turn(&mut self) -> LlmResult<ModelTurn> {
        let mut body = self.body.clone();
        body["messages"] = Value::Array(self.messages.clone());

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(transport_error)?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "anthropic"));
        }

        let raw: Value = serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
            message: format!("Failed to parse response: {}", e),
        })?;
        let parsed: MessagesResponse =
            serde_json::from_value(raw.clone()).map_err(|e| LlmError::ParseError {
                message: format!("Unexpected response shape: {}", e),
            })?;

        Ok(parse_turn(parsed).with_raw(raw))
    }

    fn record_tool_round(&mut self, turn: &ModelTurn, results: &[(ToolCall, ToolInvocationResult)]) {
        let content = match turn.raw.get("content") {
            Some(content) if content.is_array() => content.clone(),
            _ => Value::Array(
                turn.tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        })
                    })
                    .collect(),
            ),
        };
        self.messages
            .push(json!({ "role": "assistant", "content": content }));

        let blocks: Vec<Value> = results
            .iter()
            .map(|(call, result)| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": call.id,
                    "content": result.to_content(),
                    "is_error": !result.success,
                })
            })
            .collect();
        self.messages.push(json!({ "role": "user", "content": blocks }));
    }
}

fn parse_turn(response: MessagesResponse) -> ModelTurn {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                })
            }
            ContentBlock::Other => {}
        }
    }
    ModelTurn {
        text: if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        },
        tool_calls,
        raw: Value::Null,
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    fn name(&self) -> &'static str {
        "anthropic"
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
            .ok_or_else(|| missing_api_key_error("anthropic"))?;

        let (system, messages) = build_messages(&request);
        let mut body = json!({
            "model": config.model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(to_anthropic_tools(&request.tools));
        }

        tracing::info!(
            provider = "anthropic",
            model = %config.model,
            tools = request.tools.len(),
            history = request.history.len(),
            "sending chat request"
        );

        let mut conversation = AnthropicConversation {
            client: &self.client,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            api_key,
            body,
            messages,
        };
        run_tool_loop(&mut conversation, tools, self.max_iterations).await
    }
}

// Response wire types

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}
