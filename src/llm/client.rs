//! Client facade and provider adapter trait
//!
//! `AiClient` picks one `ProviderAdapter` when it is constructed and exposes a
//! single `send_message` entry point. Adapters only translate wire shapes; all
//! HTTP and stream pumping happens here.

use std::fmt;
use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::anthropic::AnthropicAdapter;
use super::azure::AzureOpenAiAdapter;
use super::streaming::{StreamDecoder, StreamEvent};
use super::types::{CompletionResponse, Message, ModelConfiguration, Prompt, ProviderKind, Role, StreamUpdate, Usage};

/// Caller-supplied receiver of stream updates
pub type StreamSink<'a> = &'a mut (dyn FnMut(StreamUpdate) + Send);

/// Translates the normalized call into one provider's wire shapes
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Model name reported when the provider does not echo one
    fn model(&self) -> &str;

    /// Full URL for the request, including any query parameters
    fn request_url(&self) -> String;

    /// Provider request body
    fn build_request(&self, messages: &[Message], system: Option<&str>, stream: bool) -> Value;

    /// Credential and protocol headers
    fn apply_headers(&self, builder: RequestBuilder) -> RequestBuilder;

    /// Normalize a non-streaming response body
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError>;

    /// Fresh decoder with this provider's envelope rules
    fn decoder(&self) -> StreamDecoder {
        StreamDecoder::new(self.kind())
    }
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::ApiError { status: 429, .. })
    }

    /// Whether a caller-level retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => *status == 429 || *status >= 500,
            LlmError::Network(_) => true,
            LlmError::StreamInterrupted(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::JsonError(_) => false,
            LlmError::Configuration(_) => false,
        }
    }
}

/// Pull the human-readable message out of a provider error body
///
/// Understands `{error:{message}}`, `{error:"..."}` and `{message}`; anything
/// else is returned as the raw body.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = value["error"].as_str() {
            return message.to_string();
        }
        if let Some(message) = value["message"].as_str() {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Single entry point for talking to either provider
pub struct AiClient {
    http: Client,
    adapter: Box<dyn ProviderAdapter>,
    usage: Arc<Mutex<Usage>>,
}

impl AiClient {
    /// Validate the configuration and select the matching adapter
    pub fn new(config: ModelConfiguration) -> Result<Self, LlmError> {
        config.validate()?;

        let http = Client::builder().timeout(config.timeout).build()?;
        info!("AiClient: using {} adapter for model {}", config.kind, config.model);

        Ok(Self {
            http,
            adapter: adapter_for(config),
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.adapter.kind()
    }

    pub fn model(&self) -> &str {
        self.adapter.model()
    }

    /// Cumulative token usage across non-streaming calls
    pub fn total_usage(&self) -> Usage {
        *self.usage.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send a prompt; streams into `on_stream` when a sink is given
    pub async fn send_message(
        &self,
        prompt: impl Into<Prompt>,
        on_stream: Option<StreamSink<'_>>,
        system: Option<&str>,
    ) -> Result<CompletionResponse, LlmError> {
        match on_stream {
            Some(sink) => self.stream(prompt, system, sink).await,
            None => self.complete(prompt, system).await,
        }
    }

    /// Non-streaming completion
    pub async fn complete(
        &self,
        prompt: impl Into<Prompt>,
        system: Option<&str>,
    ) -> Result<CompletionResponse, LlmError> {
        let messages = prompt.into().into_messages();
        let body = self.adapter.build_request(&messages, system, false);

        let response = self.send_request(body).await?;
        let value = parse_body(&response.text().await?)?;
        let parsed = self.adapter.parse_response(value)?;

        {
            let mut total = self.usage.lock().unwrap_or_else(|e| e.into_inner());
            total.add(&parsed.usage);
        }

        Ok(parsed)
    }

    /// Streaming completion; the returned content is the concatenated deltas
    pub async fn stream(
        &self,
        prompt: impl Into<Prompt>,
        system: Option<&str>,
        sink: StreamSink<'_>,
    ) -> Result<CompletionResponse, LlmError> {
        let messages = prompt.into().into_messages();
        let body = self.adapter.build_request(&messages, system, true);

        let response = self.send_request(body).await?;
        let content = pump_stream(self.adapter.decoder(), response.bytes_stream(), sink).await?;

        Ok(CompletionResponse {
            content,
            role: Role::Assistant,
            model: self.adapter.model().to_string(),
            usage: Usage::default(),
        })
    }

    async fn send_request(&self, body: Value) -> Result<Response, LlmError> {
        let url = self.adapter.request_url();
        debug!("AiClient: POST {}", url);

        let request = self.http.post(&url).json(&body);
        let response = self.adapter.apply_headers(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&error_body);
            warn!("AiClient: provider returned {}: {}", status, message);
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl fmt::Debug for AiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiClient")
            .field("kind", &self.adapter.kind())
            .field("model", &self.adapter.model())
            .finish()
    }
}

/// Decode a successful response body; malformed JSON is not a transport error
fn parse_body(text: &str) -> Result<Value, LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::InvalidResponse("empty response body".to_string()));
    }
    Ok(serde_json::from_str(text)?)
}

/// The only place that branches on the provider kind
pub fn adapter_for(config: ModelConfiguration) -> Box<dyn ProviderAdapter> {
    match config.kind {
        ProviderKind::AzureOpenAi => Box::new(AzureOpenAiAdapter::new(config)),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter::new(config)),
    }
}

/// Drive a byte stream through `decoder`, forwarding every event to `sink`.
///
/// The sink always sees exactly one `Done`: from the provider, synthesized
/// when the transport ends early, or after an inline error if a read fails.
pub async fn pump_stream<S, B, E>(
    mut decoder: StreamDecoder,
    stream: S,
    sink: StreamSink<'_>,
) -> Result<String, LlmError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut content = String::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for event in decoder.feed(bytes) {
                    if forward(event, &mut content, sink) {
                        return Ok(content);
                    }
                }
            }
            Err(e) => {
                let message = format!("Stream read failed: {}", e);
                warn!("pump_stream: {}", message);
                sink(StreamUpdate::Error {
                    error: message.clone(),
                });
                sink(StreamUpdate::Done);
                return Err(LlmError::StreamInterrupted(message));
            }
        }
    }

    for event in decoder.close() {
        if forward(event, &mut content, sink) {
            break;
        }
    }

    Ok(content)
}

/// Returns true once the terminal event has been delivered
fn forward(event: StreamEvent, content: &mut String, sink: &mut (dyn FnMut(StreamUpdate) + Send)) -> bool {
    let terminal = matches!(event, StreamEvent::Done);
    match &event {
        StreamEvent::Delta { content: text, .. } => content.push_str(text),
        StreamEvent::Error { message } => warn!("pump_stream: recoverable stream error: {}", message),
        StreamEvent::Done => debug!("pump_stream: done after {} bytes of content", content.len()),
    }
    sink(event.into());
    terminal
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn collect_updates(chunks: Vec<Result<&'static str, String>>, kind: ProviderKind) -> (Result<String, LlmError>, Vec<StreamUpdate>) {
        let mut updates = Vec::new();
        let result = {
            let mut sink = |u: StreamUpdate| updates.push(u);
            futures::executor::block_on(pump_stream(StreamDecoder::new(kind), stream::iter(chunks), &mut sink))
        };
        (result, updates)
    }

    fn text_delta(content: &str) -> StreamUpdate {
        StreamUpdate::Delta {
            content: content.to_string(),
            role: Role::Assistant,
        }
    }

    #[test]
    fn test_pump_azure_hello() {
        let (result, updates) = collect_updates(
            vec![
                Ok("data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n"),
                Ok("data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n"),
                Ok("data: [DONE]\n"),
            ],
            ProviderKind::AzureOpenAi,
        );
        assert_eq!(result.unwrap(), "Hello");
        assert_eq!(updates, vec![text_delta("He"), text_delta("llo"), StreamUpdate::Done]);
    }

    #[test]
    fn test_pump_synthesizes_done_when_transport_ends() {
        let (result, updates) = collect_updates(
            vec![Ok("data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"partial\"}}\n")],
            ProviderKind::Anthropic,
        );
        assert_eq!(result.unwrap(), "partial");
        assert_eq!(updates, vec![text_delta("partial"), StreamUpdate::Done]);
    }

    #[test]
    fn test_pump_continues_after_malformed_line() {
        let (result, updates) = collect_updates(
            vec![
                Ok("data: {broken\n"),
                Ok("data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: [DONE]\n"),
            ],
            ProviderKind::AzureOpenAi,
        );
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(updates.len(), 3);
        assert!(matches!(updates[0], StreamUpdate::Error { .. }));
        assert_eq!(updates[1], text_delta("ok"));
        assert_eq!(updates[2], StreamUpdate::Done);
    }

    #[test]
    fn test_pump_read_failure_ends_with_done() {
        let (result, updates) = collect_updates(
            vec![
                Ok("data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n"),
                Err("connection reset".to_string()),
                Ok("data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n"),
            ],
            ProviderKind::AzureOpenAi,
        );
        assert!(matches!(result, Err(LlmError::StreamInterrupted(ref m)) if m.contains("connection reset")));
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], text_delta("a"));
        assert!(matches!(updates[1], StreamUpdate::Error { .. }));
        assert_eq!(updates[2], StreamUpdate::Done);
    }

    #[test]
    fn test_pump_ignores_data_after_done() {
        let (_, updates) = collect_updates(
            vec![Ok("data: [DONE]\n"), Ok("data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n")],
            ProviderKind::AzureOpenAi,
        );
        assert_eq!(updates, vec![StreamUpdate::Done]);
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(extract_error_message(r#"{"error":{"message":"Invalid key"}}"#), "Invalid key");
        assert_eq!(extract_error_message(r#"{"error":"quota"}"#), "quota");
        assert_eq!(extract_error_message(r#"{"message":"denied"}"#), "denied");
        assert_eq!(extract_error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(extract_error_message(""), "Unknown error");
    }

    #[test]
    fn test_llm_error_is_retryable() {
        let api = |status| LlmError::ApiError {
            status,
            message: "x".to_string(),
        };
        assert!(api(500).is_retryable());
        assert!(api(429).is_retryable());
        assert!(api(429).is_rate_limit());
        assert!(!api(400).is_retryable());
        assert!(!LlmError::InvalidResponse("bad".to_string()).is_retryable());
        assert!(!LlmError::Configuration("bad".to_string()).is_retryable());
        assert!(LlmError::StreamInterrupted("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_malformed_success_body_is_not_retryable() {
        let err = parse_body("{\"choices\": [").unwrap_err();
        assert!(matches!(err, LlmError::JsonError(_)));
        assert!(!err.is_retryable());

        let err = parse_body("  ").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));

        assert_eq!(parse_body("{\"id\": 1}").unwrap()["id"], 1);
    }

    #[test]
    fn test_adapter_selection() {
        let azure = ModelConfiguration::new(ProviderKind::AzureOpenAi, "https://x", "k", "gpt-4o");
        let anthropic = ModelConfiguration::new(ProviderKind::Anthropic, "https://y", "k", "claude");
        assert_eq!(adapter_for(azure).kind(), ProviderKind::AzureOpenAi);
        assert_eq!(adapter_for(anthropic).kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = ModelConfiguration::new(ProviderKind::Anthropic, "https://y", "", "claude");
        assert!(matches!(AiClient::new(config), Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_client_debug_hides_key() {
        let config = ModelConfiguration::new(ProviderKind::Anthropic, "https://y", "sk-secret", "claude");
        let client = AiClient::new(config).unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("AiClient"));
        assert!(debug.contains("claude"));
        assert!(!debug.contains("sk-secret"));
        assert_eq!(client.kind(), ProviderKind::Anthropic);
        assert_eq!(client.total_usage(), Usage::default());
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AiClient>();
    }
}
