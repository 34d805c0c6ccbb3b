//! Streaming support for LLM responses.
//!
//! `StreamDecoder` turns arbitrarily chunked `data: ` framed bytes into
//! complete `StreamEvent`s. Network reads never line up with event
//! boundaries, so the decoder buffers raw bytes and only parses whole lines.

use log::debug;
use serde_json::Value;

use super::types::{ProviderKind, Role, StreamUpdate};

/// Prefix carried by every event line
const DATA_PREFIX: &str = "data: ";

/// Payload that marks the end of a stream
const DONE_SENTINEL: &str = "[DONE]";

/// Events produced by the decoder, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text fragment
    Delta { content: String, role: Role },
    /// Stream completed; nothing follows
    Done,
    /// One event line could not be decoded; the stream continues
    Error { message: String },
}

impl From<StreamEvent> for StreamUpdate {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Delta { content, role } => StreamUpdate::Delta { content, role },
            StreamEvent::Error { message } => StreamUpdate::Error { error: message },
            StreamEvent::Done => StreamUpdate::Done,
        }
    }
}

/// Stateful line decoder for one response stream.
#[derive(Debug)]
pub struct StreamDecoder {
    kind: ProviderKind,
    buffer: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    /// Create a decoder using the envelope rules of `kind`.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Whether the terminal `Done` has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append a raw chunk and return every event completed by it.
    ///
    /// The trailing partial line stays buffered until its terminator arrives.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk.as_ref());

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.parse_line(&line[..pos], &mut events);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        events
    }

    /// Flush the trailing line and terminate the stream.
    ///
    /// Emits a synthesized `Done` when the transport ended without one.
    pub fn close(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.parse_line(&line, &mut events);
        }

        if !self.finished {
            debug!("StreamDecoder: stream ended without completion marker, synthesizing Done");
            self.finish(&mut events);
        }

        events
    }

    fn finish(&mut self, events: &mut Vec<StreamEvent>) {
        self.finished = true;
        events.push(StreamEvent::Done);
    }

    fn parse_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\r');

        if line.trim().is_empty() {
            return;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let payload = payload.trim();

        if payload == DONE_SENTINEL {
            self.finish(events);
            return;
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                debug!("StreamDecoder: malformed event line: {}", e);
                events.push(StreamEvent::Error {
                    message: format!("Failed to parse stream event: {}", e),
                });
                return;
            }
        };

        match self.kind {
            ProviderKind::AzureOpenAi => self.decode_azure(&value, events),
            ProviderKind::Anthropic => self.decode_anthropic(&value, events),
        }
    }

    /// `choices[0].delta.{content, role}`
    fn decode_azure(&mut self, value: &Value, events: &mut Vec<StreamEvent>) {
        if let Some(message) = value["error"]["message"].as_str() {
            events.push(StreamEvent::Error {
                message: message.to_string(),
            });
            return;
        }

        let delta = &value["choices"][0]["delta"];
        let Some(content) = delta["content"].as_str() else {
            return;
        };
        if content.is_empty() {
            return;
        }

        let role = delta["role"].as_str().map(Role::from_wire).unwrap_or(Role::Assistant);
        events.push(StreamEvent::Delta {
            content: content.to_string(),
            role,
        });
    }

    /// `type`-discriminated events with `delta.text`
    fn decode_anthropic(&mut self, value: &Value, events: &mut Vec<StreamEvent>) {
        match value["type"].as_str() {
            Some("message_start") => {
                debug!("StreamDecoder: message_start {}", value["message"]["id"]);
            }
            Some("content_block_delta") => {
                if let Some(text) = value["delta"]["text"].as_str() {
                    events.push(StreamEvent::Delta {
                        content: text.to_string(),
                        role: Role::Assistant,
                    });
                }
            }
            Some("message_delta") | Some("message_stop") => self.finish(events),
            Some("error") => {
                let message = value["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown provider error")
                    .to_string();
                events.push(StreamEvent::Error { message });
            }
            _ => {}
        }
    }
}
