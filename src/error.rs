//! Error types for tabpilot
//!
//! Centralized error handling using thiserror. Each layer keeps its own enum
//! (`LlmError` for the client, `ToolError` for orchestration) and converts
//! into `PilotError` at the crate boundary.

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::ToolError;

/// All error types that can surface from tabpilot
#[derive(Debug, Error)]
pub enum PilotError {
    /// LLM client error (transport, API status, configuration)
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Tool lookup, validation or execution error
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for tabpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;
