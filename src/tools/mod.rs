//! Tool System - definitions, registry, orchestration and built-in tools
//!
//! This module provides:
//! - ToolDefinition with parameter schema, message templates and handler
//! - ToolRegistry, a shared name → definition map
//! - ToolOrchestrator for validated, retried and chained execution
//! - EventNotifier lifecycle slots
//! - JSON chain plans: loading, checking and running
//! - Built-in browser tools behind `BrowserCapabilities`

pub mod builtin;
mod context;
mod definition;
mod execution;
mod notifier;
mod orchestrator;
mod plan;
mod registry;
mod template;

pub use builtin::{
    BrowserCapabilities, DetachedBrowser, GENERATE_TOOL_NAME, MAX_DELEGATION_DEPTH, PageContent, SearchHit, TabInfo,
    register_builtin_tools,
};
pub use context::{AttemptError, ExecutionContext, ToolError};
pub use definition::{
    FnHandler, ParamType, ParameterSchema, ParameterSpec, ToolDefinition, ToolFlags, ToolHandler, ToolMessages,
    handler_fn,
};
pub use execution::{Execution, ExecutionStatus};
pub use notifier::{ChainEvent, EventNotifier, Handler, ToolEvent, event_names};
pub use orchestrator::{ChainAbort, ChainResult, RetryPolicy, StepResult, ToolCallPlan, ToolOrchestrator};
pub use plan::{check_plan, load_plan, run_plan};
pub use registry::{ToolRegistry, WeakToolRegistry};
pub use template::{render_template, render_value};
