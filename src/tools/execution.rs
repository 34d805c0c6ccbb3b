//! Execution records and their forward-only status machine

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::ToolError;
use crate::id::generate_execution_id;

/// Status of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Pending may fail without running (validation); nothing moves backward
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Error)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One invocation of one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub tool: String,
    pub args: Value,
    pub status: ExecutionStatus,
    pub retry_count: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(tool: impl Into<String>, args: Value, retry_count: u32) -> Self {
        Self {
            id: generate_execution_id(),
            tool: tool.into(),
            args,
            status: ExecutionStatus::Pending,
            retry_count,
            result: None,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<(), ToolError> {
        if !self.status.can_transition_to(next) {
            return Err(ToolError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// pending → running
    pub fn start(&mut self) -> Result<(), ToolError> {
        self.transition(ExecutionStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// running → completed, result attached verbatim
    pub fn complete(&mut self, result: Value) -> Result<(), ToolError> {
        self.transition(ExecutionStatus::Completed)?;
        self.result = Some(result);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// pending|running → error
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ToolError> {
        self.transition(ExecutionStatus::Error)?;
        self.error = Some(message.into());
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
