//! Anthropic messages API adapter
//!
//! System text is not a message role on this API; any `system` messages in the
//! conversation are folded into the top-level `system` field.

use reqwest::RequestBuilder;
use serde_json::{json, Value};

use super::client::{LlmError, ProviderAdapter};
use super::types::{CompletionResponse, Message, ModelConfiguration, ProviderKind, Role, Usage};

pub struct AnthropicAdapter {
    config: ModelConfiguration,
}

impl AnthropicAdapter {
    pub fn new(config: ModelConfiguration) -> Self {
        Self { config }
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn request_url(&self) -> String {
        self.config.endpoint.clone()
    }

    fn build_request(&self, messages: &[Message], system: Option<&str>, stream: bool) -> Value {
        let mut system_parts: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            system_parts.push(system);
        }

        let wire: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": wire,
            "max_tokens": self.config.params.max_tokens,
            "temperature": self.config.params.temperature,
            "stream": stream
        });

        if !system_parts.is_empty() {
            body["system"] = json!(system_parts.join("\n\n"));
        }

        body
    }

    fn apply_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", self.config.api_version())
            .header("content-type", "application/json")
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("response has no content array".to_string()))?;

        let mut content = String::new();
        for block in blocks {
            // Blocks without a type are treated as text
            if block["type"].as_str().is_some_and(|t| t != "text") {
                continue;
            }
            if let Some(text) = block["text"].as_str() {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(text);
            }
        }

        let role = body["role"].as_str().map(Role::from_wire).unwrap_or(Role::Assistant);
        let model = body["model"].as_str().unwrap_or(&self.config.model).to_string();
        let usage = Usage::new(
            body["usage"]["input_tokens"].as_u64().unwrap_or(0),
            body["usage"]["output_tokens"].as_u64().unwrap_or(0),
        );

        Ok(CompletionResponse {
            content,
            role,
            model,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(ModelConfiguration::new(
            ProviderKind::Anthropic,
            "https://api.anthropic.com/v1/messages",
            "test-key",
            DEFAULT_MODEL,
        ))
    }

    #[test]
    fn test_request_url_is_endpoint() {
        assert_eq!(adapter().request_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_build_request_basic() {
        let body = adapter().build_request(&[Message::user("Hello")], Some("You are helpful"), false);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["stream"], false);
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn test_build_request_without_system() {
        let body = adapter().build_request(&[Message::user("Hello")], None, true);
        assert!(body.get("system").is_none());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_build_request_folds_system_messages() {
        let messages = vec![
            Message::system("Rule one"),
            Message::user("Hi"),
            Message::assistant("Hello"),
            Message::user("Again"),
        ];
        let body = adapter().build_request(&messages, Some("Rule two"), false);

        assert_eq!(body["system"], "Rule one\n\nRule two");
        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1]["role"], "assistant");
    }

    #[test]
    fn test_parse_response_text_only() {
        let response = adapter()
            .parse_response(json!({
                "content": [{ "type": "text", "text": "Hello there!" }],
                "model": DEFAULT_MODEL,
                "role": "assistant",
                "usage": { "input_tokens": 10, "output_tokens": 5 }
            }))
            .unwrap();

        assert_eq!(response.content, "Hello there!");
        assert_eq!(response.role, Role::Assistant);
        assert_eq!(response.usage.prompt_tokens, 10);
        assert_eq!(response.usage.completion_tokens, 5);
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_untyped_block_and_tool_use() {
        let response = adapter()
            .parse_response(json!({
                "content": [
                    { "text": "first" },
                    { "type": "tool_use", "id": "toolu_1", "name": "search", "input": {} },
                    { "type": "text", "text": "second" }
                ]
            }))
            .unwrap();

        assert_eq!(response.content, "first\nsecond");
        assert_eq!(response.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_parse_response_missing_content() {
        let result = adapter().parse_response(json!({ "type": "error" }));
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
