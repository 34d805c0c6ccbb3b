//! tabpilot - streaming LLM client and tool orchestration core for a browser
//! assistant
//!
//! Two halves: `llm` turns a prompt into a normalized, optionally streamed
//! completion from one of two provider wire protocols; `tools` validates,
//! retries and chains tool calls against a shared registry.

pub mod error;
pub mod id;
pub mod llm;
pub mod tools;

pub use error::{PilotError, Result};
