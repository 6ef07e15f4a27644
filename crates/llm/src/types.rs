//! LLM Types
//!
//! Core types for provider interactions: provider identity and configuration,
//! chat history, tool definitions and calls, and the error taxonomy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported language-model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAI,
    DeepSeek,
    Glm,
}

impl ProviderType {
    /// Explicit fallback order used when the selected provider has no credential.
    pub const FALLBACK_ORDER: [ProviderType; 4] = [
        ProviderType::Anthropic,
        ProviderType::OpenAI,
        ProviderType::DeepSeek,
        ProviderType::Glm,
    ];

    /// Provider used when nothing is selected and nothing is configured.
    pub const DEFAULT: ProviderType = ProviderType::Anthropic;

    /// Environment key the adapter reads its credential from at construction.
    pub fn credential_env_key(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "ANTHROPIC_API_KEY",
            ProviderType::OpenAI => "OPENAI_API_KEY",
            ProviderType::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderType::Glm => "GLM_API_KEY",
        }
    }

    /// Model used when the configuration names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "claude-sonnet-4-20250514",
            ProviderType::OpenAI => "gpt-4o",
            ProviderType::DeepSeek => "deepseek-chat",
            ProviderType::Glm => "glm-4.6",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::DeepSeek => write!(f, "deepseek"),
            ProviderType::Glm => write!(f, "glm"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "openai" | "gpt" => Ok(ProviderType::OpenAI),
            "deepseek" => Ok(ProviderType::DeepSeek),
            "glm" | "zhipu" => Ok(ProviderType::Glm),
            other => Err(format!(
                "Unknown provider '{}'. Valid providers: anthropic, openai, deepseek, glm",
                other
            )),
        }
    }
}

/// Configuration for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderType,
    /// Credential. Never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Full endpoint URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.3
}

impl ProviderConfig {
    /// Defaults for a provider, without a credential.
    pub fn for_provider(provider: ProviderType) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: None,
            model: provider.default_model().to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    /// Defaults plus the credential found under the provider's environment key.
    pub fn from_env(provider: ProviderType) -> Self {
        let api_key = std::env::var(provider.credential_env_key())
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self {
            api_key,
            ..Self::for_provider(provider)
        }
    }

    /// Whether a non-empty credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// Merge a partial update. Applying the same update twice is a no-op.
    pub fn apply_update(&mut self, update: ProviderConfigUpdate) {
        if let Some(api_key) = update.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = update.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err(format!("{}: model name must not be empty", self.provider));
        }
        if self.max_tokens == 0 {
            return Err(format!("{}: max_tokens must be > 0", self.provider));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "{}: temperature must be between 0.0 and 2.0",
                self.provider
            ));
        }
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| format!("{}: invalid base_url '{}': {}", self.provider, base_url, e))?;
        }
        Ok(())
    }
}

/// Partial provider configuration, merged via [`ProviderConfig::apply_update`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProviderConfigUpdate {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Default::default()
        }
    }
}

/// Message role in the retained chat history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// JSON Schema subset used to declare tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    fn scalar(schema_type: &str, description: Option<&str>) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
            enum_values: None,
        }
    }

    /// Create a string schema
    pub fn string(description: Option<&str>) -> Self {
        Self::scalar("string", description)
    }

    /// Create a string schema restricted to the given values
    pub fn string_enum(description: Option<&str>, values: &[&str]) -> Self {
        Self {
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::scalar("string", description)
        }
    }

    /// Create an integer schema
    pub fn integer(description: Option<&str>) -> Self {
        Self::scalar("integer", description)
    }

    /// Create a boolean schema
    pub fn boolean(description: Option<&str>) -> Self {
        Self::scalar("boolean", description)
    }

    /// Create an object schema
    pub fn object(
        description: Option<&str>,
        properties: BTreeMap<String, ParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            properties: Some(properties),
            required: Some(required),
            ..Self::scalar("object", description)
        }
    }

    /// Create an array schema
    pub fn array(description: Option<&str>, items: ParameterSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::scalar("array", description)
        }
    }

    /// Required property names, empty when none are declared.
    pub fn required_fields(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }
}

/// Definition of a tool that can be called by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ParameterSchema,
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Outcome of executing one tool call, as reported back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolInvocationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Serialized form sent back to the model as the tool result content.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

/// One executed tool call within a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTool {
    pub name: String,
    pub arguments: serde_json::Value,
    pub success: bool,
    pub message: String,
}

/// Result of a full `chat` exchange, including every tool round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    /// Final text for the user.
    pub response: String,
    /// Names of every tool executed, in execution order.
    pub tools_called: Vec<String>,
    pub tool_results: Vec<ExecutedTool>,
    /// Number of model requests made.
    pub iterations: usize,
    /// True when the iteration cap stopped the loop.
    pub exhausted: bool,
    /// Last raw backend response.
    pub raw: serde_json::Value,
}

/// Error types for provider operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// Provider invoked without a credential; no request was attempted
    NotConfigured { provider: String },
    /// Authentication failed (invalid API key)
    AuthenticationFailed { message: String },
    /// Rate limit exceeded
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },
    /// Invalid request (bad parameters)
    InvalidRequest { message: String },
    /// Server error from the provider
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Network/connection error, including timeouts
    NetworkError { message: String },
    /// Response parsing error
    ParseError { message: String },
    /// Other error
    Other { message: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::NotConfigured { provider } => {
                write!(f, "Provider not configured: API key missing for {}", provider)
            }
            LlmError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            LlmError::RateLimited { message, .. } => write!(f, "Rate limited: {}", message),
            LlmError::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            LlmError::ServerError { message, status } => {
                if let Some(s) = status {
                    write!(f, "Server error ({}): {}", s, message)
                } else {
                    write!(f, "Server error: {}", message)
                }
            }
            LlmError::NetworkError { message } => write!(f, "Network error: {}", message),
            LlmError::ParseError { message } => write!(f, "Parse error: {}", message),
            LlmError::Other { message } => write!(f, "Error: {}", message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Result type for provider operations
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_unconfigured_by_default() {
        let config = ProviderConfig::for_provider(ProviderType::OpenAI);
        assert!(!config.is_configured());
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_apply_update_is_idempotent() {
        let mut config = ProviderConfig::for_provider(ProviderType::Glm);
        let update = ProviderConfigUpdate {
            api_key: Some("key".to_string()),
            model: Some("glm-4.5".to_string()),
            ..Default::default()
        };
        config.apply_update(update.clone());
        let once = serde_json::to_string(&config).unwrap();
        config.apply_update(update);
        assert_eq!(serde_json::to_string(&config).unwrap(), once);
        assert!(config.is_configured());
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let mut config = ProviderConfig::for_provider(ProviderType::Anthropic);
        config.apply_update(ProviderConfigUpdate::api_key("   "));
        assert!(!config.is_configured());
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut config = ProviderConfig::for_provider(ProviderType::OpenAI);
        config.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ProviderConfig::for_provider(ProviderType::OpenAI);
        assert!(config.validate().is_ok());
        config.temperature = 3.0;
        assert!(config.validate().is_err());
        config.temperature = 0.5;
        config.base_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_type_parse() {
        assert_eq!("Claude".parse::<ProviderType>(), Ok(ProviderType::Anthropic));
        assert!("mystery".parse::<ProviderType>().is_err());
        for provider in ProviderType::FALLBACK_ORDER {
            assert_eq!(provider.to_string().parse::<ProviderType>(), Ok(provider));
        }
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::NotConfigured {
            provider: "openai".to_string(),
        };
        assert!(err.to_string().contains("API key missing"));

        let err = LlmError::RateLimited {
            message: "Too many requests".to_string(),
            retry_after: Some(60),
        };
        assert!(err.to_string().contains("Rate limited"));
    }

    #[test]
    fn test_tool_result_content_is_json() {
        let content = ToolInvocationResult::err("Column 'ready' does not exist").to_content();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["success"], false);
    }
}
