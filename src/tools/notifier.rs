//! Lifecycle notifications for tool executions and chains
//!
//! Each event name has exactly one slot. A handler that errors or panics is
//! logged and forgotten; it never affects the execution that triggered it.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, error, warn};
use serde::Serialize;
use serde_json::Value;

/// Event name constants
pub mod event_names {
    pub const TOOL_START: &str = "tool_start";
    pub const TOOL_PROGRESS: &str = "tool_progress";
    pub const TOOL_COMPLETE: &str = "tool_complete";
    pub const TOOL_ERROR: &str = "tool_error";
    pub const CHAIN_START: &str = "chain_start";
    pub const CHAIN_PROGRESS: &str = "chain_progress";
    pub const CHAIN_COMPLETE: &str = "chain_complete";
}

/// Payload for tool lifecycle events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolEvent {
    pub execution_id: String,
    pub tool: String,
    pub args: Value,
    /// Rendered message template for this stage
    pub message: String,
    pub attempt: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Payload for chain lifecycle events
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChainEvent {
    pub chain_id: String,
    pub total_steps: usize,
    pub step_index: Option<usize>,
    pub tool: Option<String>,
    pub success: Option<bool>,
}

pub type Handler<E> = Box<dyn Fn(&E) -> eyre::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct EventNotifier {
    tool_start: Option<Handler<ToolEvent>>,
    tool_progress: Option<Handler<ToolEvent>>,
    tool_complete: Option<Handler<ToolEvent>>,
    tool_error: Option<Handler<ToolEvent>>,
    chain_start: Option<Handler<ChainEvent>>,
    chain_progress: Option<Handler<ChainEvent>>,
    chain_complete: Option<Handler<ChainEvent>>,
}

macro_rules! slot_setter {
    ($method:ident, $slot:ident, $event:ty) => {
        pub fn $method<F>(mut self, handler: F) -> Self
        where
            F: Fn(&$event) -> eyre::Result<()> + Send + Sync + 'static,
        {
            self.$slot = Some(Box::new(handler));
            self
        }
    };
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    slot_setter!(on_tool_start, tool_start, ToolEvent);
    slot_setter!(on_tool_progress, tool_progress, ToolEvent);
    slot_setter!(on_tool_complete, tool_complete, ToolEvent);
    slot_setter!(on_tool_error, tool_error, ToolEvent);
    slot_setter!(on_chain_start, chain_start, ChainEvent);
    slot_setter!(on_chain_progress, chain_progress, ChainEvent);
    slot_setter!(on_chain_complete, chain_complete, ChainEvent);

    pub fn tool_start(&self, event: &ToolEvent) {
        dispatch(event_names::TOOL_START, self.tool_start.as_ref(), event);
    }

    pub fn tool_progress(&self, event: &ToolEvent) {
        dispatch(event_names::TOOL_PROGRESS, self.tool_progress.as_ref(), event);
    }

    pub fn tool_complete(&self, event: &ToolEvent) {
        dispatch(event_names::TOOL_COMPLETE, self.tool_complete.as_ref(), event);
    }

    pub fn tool_error(&self, event: &ToolEvent) {
        dispatch(event_names::TOOL_ERROR, self.tool_error.as_ref(), event);
    }

    pub fn chain_start(&self, event: &ChainEvent) {
        dispatch(event_names::CHAIN_START, self.chain_start.as_ref(), event);
    }

    pub fn chain_progress(&self, event: &ChainEvent) {
        dispatch(event_names::CHAIN_PROGRESS, self.chain_progress.as_ref(), event);
    }

    pub fn chain_complete(&self, event: &ChainEvent) {
        dispatch(event_names::CHAIN_COMPLETE, self.chain_complete.as_ref(), event);
    }
}

fn dispatch<E>(name: &str, handler: Option<&Handler<E>>, event: &E) {
    let Some(handler) = handler else {
        debug!("EventNotifier: no handler for {}", name);
        return;
    };

    match catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("EventNotifier: {} handler failed: {}", name, e),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("EventNotifier: {} handler panicked: {}", name, reason);
        }
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("tool_start", &self.tool_start.is_some())
            .field("tool_progress", &self.tool_progress.is_some())
            .field("tool_complete", &self.tool_complete.is_some())
            .field("tool_error", &self.tool_error.is_some())
            .field("chain_start", &self.chain_start.is_some())
            .field("chain_progress", &self.chain_progress.is_some())
            .field("chain_complete", &self.chain_complete.is_some())
            .finish()
    }
}
