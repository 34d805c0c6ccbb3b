//! Azure OpenAI chat-completions adapter
//!
//! The deployment is addressed by the endpoint URL, so the request body
//! carries no model name. The protocol version travels as `api-version`.

use reqwest::RequestBuilder;
use serde_json::{json, Value};

use super::client::{LlmError, ProviderAdapter};
use super::types::{CompletionResponse, Message, ModelConfiguration, ProviderKind, Role, Usage};

pub struct AzureOpenAiAdapter {
    config: ModelConfiguration,
}

impl AzureOpenAiAdapter {
    pub fn new(config: ModelConfiguration) -> Self {
        Self { config }
    }
}

impl ProviderAdapter for AzureOpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AzureOpenAi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn request_url(&self) -> String {
        let endpoint = &self.config.endpoint;
        if endpoint.contains("api-version=") {
            return endpoint.clone();
        }
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}api-version={}", endpoint, separator, self.config.api_version())
    }

    fn build_request(&self, messages: &[Message], system: Option<&str>, stream: bool) -> Value {
        let mut wire: Vec<Value> = Vec::with_capacity(messages.len() + 1);

        if let Some(system) = system.filter(|s| !s.is_empty()) {
            wire.push(json!({ "role": Role::System.as_str(), "content": system }));
        }
        wire.extend(
            messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );

        let params = &self.config.params;
        json!({
            "messages": wire,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "presence_penalty": params.presence_penalty,
            "frequency_penalty": params.frequency_penalty,
            "top_p": params.top_p,
            "stream": stream
        })
    }

    fn apply_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("api-key", &self.config.api_key)
            .header("content-type", "application/json")
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choice = body["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))?;

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();
        let role = message["role"].as_str().map(Role::from_wire).unwrap_or(Role::Assistant);

        let model = body["model"].as_str().unwrap_or(&self.config.model).to_string();

        let usage = &body["usage"];
        let prompt_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = usage["completion_tokens"].as_u64().unwrap_or(0);
        let usage = Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: usage["total_tokens"]
                .as_u64()
                .unwrap_or(prompt_tokens + completion_tokens),
        };

        Ok(CompletionResponse {
            content,
            role,
            model,
            usage,
        })
    }
}
