//! Scripted provider for tests.
//!
//! Replays a queue of model turns instead of calling a backend, while still
//! going through the shared tool-call loop so iteration limits and tool
//! execution behave exactly as with a real adapter.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::continuation::{run_tool_loop, Conversation, ModelTurn, MAX_TOOL_ITERATIONS};
use crate::provider::{missing_api_key_error, ChatProvider, ChatRequest, ToolInvoker};
use crate::types::{
    ChatOutcome, LlmError, LlmResult, ProviderConfig, ProviderConfigUpdate, ProviderType,
    ToolCall, ToolInvocationResult,
};

enum ScriptStep {
    Turn(ModelTurn),
    Fail(LlmError),
}

pub struct ScriptedProvider {
    provider: ProviderType,
    config: RwLock<ProviderConfig>,
    script: Mutex<VecDeque<ScriptStep>>,
    always_call: Mutex<Option<(String, Value)>>,
    requests: Mutex<Vec<ChatRequest>>,
    tool_rounds: Mutex<Vec<Vec<(ToolCall, ToolInvocationResult)>>>,
    chat_calls: AtomicUsize,
    model_turns: AtomicUsize,
    max_iterations: usize,
}

impl ScriptedProvider {
    /// A configured provider with an empty script.
    pub fn new(provider: ProviderType) -> Self {
        let mut config = ProviderConfig::for_provider(provider);
        config.api_key = Some("test-key".to_string());
        Self::with_config(config)
    }

    /// A provider without a credential.
    pub fn unconfigured(provider: ProviderType) -> Self {
        Self::with_config(ProviderConfig::for_provider(provider))
    }

    fn with_config(config: ProviderConfig) -> Self {
        Self {
            provider: config.provider,
            config: RwLock::new(config),
            script: Mutex::new(VecDeque::new()),
            always_call: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            tool_rounds: Mutex::new(Vec::new()),
            chat_calls: AtomicUsize::new(0),
            model_turns: AtomicUsize::new(0),
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(ScriptStep::Turn(ModelTurn::text(text)))
    }

    pub fn push_tool_call(&self, name: &str, arguments: Value) -> &Self {
        let id = format!("call_{}", self.script_len() + 1);
        self.push(ScriptStep::Turn(ModelTurn::tool_call(ToolCall {
            id,
            name: name.to_string(),
            arguments,
        })))
    }

    pub fn push_turn(&self, turn: ModelTurn) -> &Self {
        self.push(ScriptStep::Turn(turn))
    }

    pub fn push_error(&self, error: LlmError) -> &Self {
        self.push(ScriptStep::Fail(error))
    }

    /// Make every model turn request the same tool, ignoring the script.
    pub fn always_call_tool(&self, name: &str, arguments: Value) -> &Self {
        *self.always_call.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((name.to_string(), arguments));
        self
    }

    /// Number of `chat` invocations, including ones rejected as unconfigured.
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Number of model requests across all chats.
    pub fn model_turns(&self) -> usize {
        self.model_turns.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Tool results fed back to the model, one entry per round.
    pub fn tool_rounds(&self) -> Vec<Vec<(ToolCall, ToolInvocationResult)>> {
        self.tool_rounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, step: ScriptStep) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
        self
    }

    fn script_len(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_step(&self) -> LlmResult<ModelTurn> {
        let turn = self.model_turns.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((name, arguments)) = self
            .always_call
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Ok(ModelTurn::tool_call(ToolCall {
                id: format!("call_{}", turn),
                name,
                arguments,
            }));
        }
        match self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            Some(ScriptStep::Turn(turn)) => Ok(turn),
            Some(ScriptStep::Fail(err)) => Err(err),
            None => Ok(ModelTurn::text("Done.")),
        }
    }
}

struct ScriptConversation<'a> {
    provider: &'a ScriptedProvider,
}

#[async_trait]
impl<'a> Conversation for ScriptConversation<'a> {
    async fn next_turn(&mut self) -> LlmResult<ModelTurn> {
        self.provider.next_step()
    }

    fn record_tool_round(&mut self, _turn: &ModelTurn, results: &[(ToolCall, ToolInvocationResult)]) {
        self.provider
            .tool_rounds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(results.to_vec());
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_configured()
    }

    fn configure(&self, update: ProviderConfigUpdate) {
        self.config
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .apply_update(update);
    }

    fn model(&self) -> String {
        self.config().model
    }

    fn config(&self) -> ProviderConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn chat(&self, request: ChatRequest, tools: &dyn ToolInvoker) -> LlmResult<ChatOutcome> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_configured() {
            return Err(missing_api_key_error(&self.provider.to_string()));
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let mut conversation = ScriptConversation { provider: self };
        run_tool_loop(&mut conversation, tools, self.max_iterations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolInvoker for Echo {
        async fn invoke(&self, call: &ToolCall) -> ToolInvocationResult {
            ToolInvocationResult::ok(format!("ran {}", call.name))
        }
    }

    #[tokio::test]
    async fn test_script_replay() {
        let provider = ScriptedProvider::new(ProviderType::OpenAI);
        provider
            .push_tool_call("navigate", serde_json::json!({"page": "board"}))
            .push_text("Opened the board.");
        let outcome = provider.chat(ChatRequest::new("open board"), &Echo).await.unwrap();
        assert_eq!(outcome.response, "Opened the board.");
        assert_eq!(provider.model_turns(), 2);
        assert_eq!(provider.tool_rounds()[0][0].1.message, "ran navigate");
    }

    #[tokio::test]
    async fn test_unconfigured_never_takes_a_turn() {
        let provider = ScriptedProvider::unconfigured(ProviderType::Glm);
        let err = provider.chat(ChatRequest::new("hi"), &Echo).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured { .. }));
        assert_eq!(provider.chat_calls(), 1);
        assert_eq!(provider.model_turns(), 0);
    }

    #[tokio::test]
    async fn test_always_call_hits_cap() {
        let provider = ScriptedProvider::new(ProviderType::Anthropic);
        provider.always_call_tool("get_tasks", serde_json::json!({}));
        let outcome = provider.chat(ChatRequest::new("loop"), &Echo).await.unwrap();
        assert!(outcome.exhausted);
        assert_eq!(provider.model_turns(), MAX_TOOL_ITERATIONS);
    }
}
