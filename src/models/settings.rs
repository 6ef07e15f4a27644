//! Settings Models
//!
//! Agent configuration stored in config.json. Credentials are not part of
//! it: adapters read their own environment keys.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskpilot_llm::{ProviderType, MAX_TOOL_ITERATIONS};
use taskpilot_tools::{VerifierConfig, DEFAULT_LOG_CAPACITY};

/// Agent configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Provider used when the session has none selected
    #[serde(default)]
    pub default_provider: Option<ProviderType>,
    /// Order tried when the selected provider has no credential
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<ProviderType>,
    /// Per-provider model overrides
    #[serde(default)]
    pub models: BTreeMap<ProviderType, String>,
    /// Model requests allowed per command
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    /// Prior user/assistant pairs sent with each command
    #[serde(default = "default_history_pairs")]
    pub history_pairs: usize,
    /// Command history entries kept in the session
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_action_log_capacity")]
    pub action_log_capacity: usize,
    /// Tools whose effects are re-read after execution
    #[serde(default = "default_verified_tools")]
    pub verified_tools: Vec<String>,
    #[serde(default = "default_verifier_read_attempts")]
    pub verifier_read_attempts: u32,
    #[serde(default = "default_verifier_retry_delay_ms")]
    pub verifier_retry_delay_ms: u64,
    /// Per-request timeout for model backends, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_fallback_order() -> Vec<ProviderType> {
    ProviderType::FALLBACK_ORDER.to_vec()
}

fn default_max_tool_iterations() -> usize {
    MAX_TOOL_ITERATIONS
}

fn default_history_pairs() -> usize {
    5
}

fn default_history_limit() -> usize {
    50
}

fn default_action_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

fn default_verified_tools() -> Vec<String> {
    VerifierConfig::default().tools
}

fn default_verifier_read_attempts() -> u32 {
    2
}

fn default_verifier_retry_delay_ms() -> u64 {
    150
}

fn default_http_timeout_secs() -> u64 {
    60
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_provider: None,
            fallback_order: default_fallback_order(),
            models: BTreeMap::new(),
            max_tool_iterations: default_max_tool_iterations(),
            history_pairs: default_history_pairs(),
            history_limit: default_history_limit(),
            action_log_capacity: default_action_log_capacity(),
            verified_tools: default_verified_tools(),
            verifier_read_attempts: default_verifier_read_attempts(),
            verifier_retry_delay_ms: default_verifier_retry_delay_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub default_provider: Option<ProviderType>,
    pub fallback_order: Option<Vec<ProviderType>>,
    pub models: Option<BTreeMap<ProviderType, String>>,
    pub max_tool_iterations: Option<usize>,
    pub history_pairs: Option<usize>,
    pub history_limit: Option<usize>,
    pub action_log_capacity: Option<usize>,
    pub verified_tools: Option<Vec<String>>,
    pub verifier_read_attempts: Option<u32>,
    pub verifier_retry_delay_ms: Option<u64>,
    pub http_timeout_secs: Option<u64>,
}

impl AgentSettings {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(provider) = update.default_provider {
            self.default_provider = Some(provider);
        }
        if let Some(order) = update.fallback_order {
            self.fallback_order = order;
        }
        if let Some(models) = update.models {
            self.models.extend(models);
        }
        if let Some(max) = update.max_tool_iterations {
            self.max_tool_iterations = max;
        }
        if let Some(pairs) = update.history_pairs {
            self.history_pairs = pairs;
        }
        if let Some(limit) = update.history_limit {
            self.history_limit = limit;
        }
        if let Some(capacity) = update.action_log_capacity {
            self.action_log_capacity = capacity;
        }
        if let Some(tools) = update.verified_tools {
            self.verified_tools = tools;
        }
        if let Some(attempts) = update.verifier_read_attempts {
            self.verifier_read_attempts = attempts;
        }
        if let Some(delay) = update.verifier_retry_delay_ms {
            self.verifier_retry_delay_ms = delay;
        }
        if let Some(timeout) = update.http_timeout_secs {
            self.http_timeout_secs = timeout;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.fallback_order.is_empty() {
            return Err("fallback_order must name at least one provider".to_string());
        }
        for (i, provider) in self.fallback_order.iter().enumerate() {
            if self.fallback_order[..i].contains(provider) {
                return Err(format!("fallback_order lists {} twice", provider));
            }
        }
        if !(1..=20).contains(&self.max_tool_iterations) {
            return Err("max_tool_iterations must be between 1 and 20".to_string());
        }
        if self.history_pairs > 50 {
            return Err("history_pairs cannot exceed 50".to_string());
        }
        if !(1..=1000).contains(&self.history_limit) {
            return Err("history_limit must be between 1 and 1000".to_string());
        }
        if self.action_log_capacity == 0 {
            return Err("action_log_capacity must be at least 1".to_string());
        }
        if self.verifier_read_attempts == 0 {
            return Err("verifier_read_attempts must be at least 1".to_string());
        }
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be at least 1 second".to_string());
        }
        if let Some((provider, _)) = self.models.iter().find(|(_, m)| m.trim().is_empty()) {
            return Err(format!("model override for {} is empty", provider));
        }
        Ok(())
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            tools: self.verified_tools.clone(),
            read_attempts: self.verifier_read_attempts,
            retry_delay: Duration::from_millis(self.verifier_retry_delay_ms),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
