//! LLM types shared by both provider adapters
//!
//! This module defines the conversation, configuration and response types.
//! Provider-specific wire shapes live in the adapter modules.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client::LlmError;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a wire role, falling back to assistant for anything unknown
    pub fn from_wire(s: &str) -> Self {
        match s {
            "system" => Role::System,
            "user" => Role::User,
            _ => Role::Assistant,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Input to `send_message`: either bare user text or a whole conversation
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Text(String),
    Conversation(Vec<Message>),
}

impl Prompt {
    /// Normalize into an ordered message list
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Prompt::Text(text) => vec![Message::user(text)],
            Prompt::Conversation(messages) => messages,
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Prompt::Conversation(messages)
    }
}

/// The two supported wire protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Azure-hosted OpenAI chat completions (`choices[0].delta.content`)
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    /// Anthropic messages API (`type` discriminated events)
    Anthropic,
}

impl ProviderKind {
    /// Environment variable consulted when no credential is configured
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::AzureOpenAi => "AZURE_OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Protocol version sent when the configuration does not name one
    pub fn default_api_version(&self) -> &'static str {
        match self {
            ProviderKind::AzureOpenAi => "2024-02-01",
            ProviderKind::Anthropic => "2023-06-01",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::AzureOpenAi => write!(f, "azure_openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Sampling parameters passed through to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.7,
            top_p: 0.95,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

/// Everything needed to talk to one model endpoint
///
/// Immutable once built; the facade owns it for its lifetime.
#[derive(Clone)]
pub struct ModelConfiguration {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub params: GenerationParams,
    pub api_version: Option<String>,
    pub timeout: Duration,
}

impl ModelConfiguration {
    pub fn new(
        kind: ProviderKind,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            params: GenerationParams::default(),
            api_version: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Protocol version, falling back to the provider default
    pub fn api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_version())
    }

    /// Reject configurations that cannot possibly produce a request
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.endpoint.trim().is_empty() {
            return Err(LlmError::Configuration("endpoint is empty".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(LlmError::Configuration(format!(
                "no credential configured for {}",
                self.kind
            )));
        }
        if self.params.max_tokens == 0 {
            return Err(LlmError::Configuration("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

// Keep the credential out of logs
impl fmt::Debug for ModelConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfiguration")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("params", &self.params)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Token usage statistics, normalized across providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate usage from another instance
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Normalized result of one `send_message` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub role: Role,
    pub model: String,
    pub usage: Usage,
}

/// What the caller's sink receives while a response streams in
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Delta { content: String, role: Role },
    Error { error: String },
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_role_from_wire_fallback() {
        assert_eq!(Role::from_wire("user"), Role::User);
        assert_eq!(Role::from_wire("system"), Role::System);
        assert_eq!(Role::from_wire("tool"), Role::Assistant);
    }

    #[test]
    fn test_prompt_from_text() {
        let prompt: Prompt = "hi".into();
        assert_eq!(prompt.into_messages(), vec![Message::user("hi")]);
    }

    #[test]
    fn test_prompt_from_conversation_keeps_order() {
        let prompt: Prompt = vec![Message::user("a"), Message::assistant("b"), Message::user("c")].into();
        let messages = prompt.into_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].content, "c");
    }

    #[test]
    fn test_provider_kind_serialization() {
        assert_eq!(serde_json::to_string(&ProviderKind::AzureOpenAi).unwrap(), "\"azure_openai\"");
        let kind: ProviderKind = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(kind, ProviderKind::Anthropic);
    }

    #[test]
    fn test_api_version_default_and_override() {
        let config = ModelConfiguration::new(ProviderKind::Anthropic, "https://x", "k", "m");
        assert_eq!(config.api_version(), "2023-06-01");
        let config = config.with_api_version("2099-01-01");
        assert_eq!(config.api_version(), "2099-01-01");
    }

    #[test]
    fn test_validate_rejects_empty_credential() {
        let config = ModelConfiguration::new(ProviderKind::AzureOpenAi, "https://x", "", "m");
        assert!(matches!(config.validate(), Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_empty_endpoint() {
        let config = ModelConfiguration::new(ProviderKind::AzureOpenAi, "  ", "k", "m");
        assert!(matches!(config.validate(), Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_max_tokens() {
        let params = GenerationParams {
            max_tokens: 0,
            ..Default::default()
        };
        let config = ModelConfiguration::new(ProviderKind::AzureOpenAi, "https://x", "k", "m").with_params(params);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_credential() {
        let config = ModelConfiguration::new(ProviderKind::Anthropic, "https://x", "secret-key", "m");
        let debug = format!("{:?}", config);
        assert!(debug.contains("ModelConfiguration"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_usage_add() {
        let mut total = Usage::new(100, 50);
        total.add(&Usage::new(10, 5));
        assert_eq!(total, Usage::new(110, 55));
        assert_eq!(total.total_tokens, 165);
    }
}
