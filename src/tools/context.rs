//! Per-call execution context and tool errors
//!
//! An `ExecutionContext` belongs to whoever started the call. The orchestrator
//! only borrows it; nothing about an in-flight call is stored on the
//! orchestrator itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::execution::ExecutionStatus;
use super::orchestrator::StepResult;

/// One failed attempt, visible to later attempts of the same call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptError {
    pub attempt: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Execution context for tools - scoped to one top-level call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// 1-based attempt number of the current try
    pub attempt: u32,

    /// Errors from earlier attempts, oldest first
    pub error_history: Vec<AttemptError>,

    /// Results of the chain steps that ran before this one
    pub previous_results: Vec<StepResult>,

    /// Free-form data supplied by the caller
    pub metadata: Map<String, Value>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            attempt: 1,
            error_history: Vec::new(),
            previous_results: Vec::new(),
            metadata: Map::new(),
        }
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_previous_results(mut self, results: Vec<StepResult>) -> Self {
        self.previous_results = results;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Append a failed attempt to the error history
    pub fn record_error(&mut self, attempt: u32, message: impl Into<String>) {
        self.error_history.push(AttemptError {
            attempt,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn last_error(&self) -> Option<&AttemptError> {
        self.error_history.last()
    }

    /// Result of the most recent successful chain step
    pub fn last_result(&self) -> Option<&Value> {
        self.previous_results
            .iter()
            .rev()
            .find(|r| r.success)
            .and_then(|r| r.result.as_ref())
    }
}

/// Errors that can occur during tool orchestration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Validation failed for '{tool}': {message}")]
    Validation { tool: String, message: String },

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    #[error("Chain aborted at step {step} ({tool}): {message}")]
    ChainAbort { step: usize, tool: String, message: String },

    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),
}

impl ToolError {
    /// Only implementation failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Execution { .. })
    }
}
