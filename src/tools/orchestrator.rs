//! Tool Orchestrator - validated execution, linear-backoff retry and
//! fail-fast chains over a shared registry
//!
//! The orchestrator never stores per-call state. Every call takes the
//! caller's `ExecutionContext`; the only thing the orchestrator keeps is the
//! history of finished executions.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::{ExecutionContext, ToolError};
use super::execution::Execution;
use super::notifier::{ChainEvent, EventNotifier, ToolEvent};
use super::registry::ToolRegistry;
use super::template::render_template;
use crate::id::generate_chain_id;

/// Retry policy for `execute_tool_with_retry`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Delay after failed attempt `attempt` (1-based): linear, not exponential
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// One planned step of a chain: `{tool, args}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPlan {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCallPlan {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self { tool: tool.into(), args }
    }
}

/// Outcome of one chain step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub tool: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(tool: impl Into<String>, result: Value) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Where and why a chain halted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainAbort {
    pub step: usize,
    pub tool: String,
    pub message: String,
}

impl From<ChainAbort> for ToolError {
    fn from(abort: ChainAbort) -> Self {
        ToolError::ChainAbort {
            step: abort.step,
            tool: abort.tool,
            message: abort.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainResult {
    pub chain_id: String,
    /// AND of every attempted step's success
    pub success: bool,
    /// Results for the steps that ran, in order
    pub results: Vec<StepResult>,
    pub abort: Option<ChainAbort>,
}

impl ChainResult {
    /// Turn a halted chain into `ToolError::ChainAbort`
    pub fn into_result(self) -> Result<Vec<StepResult>, ToolError> {
        match self.abort {
            Some(abort) => Err(abort.into()),
            None => Ok(self.results),
        }
    }
}

pub struct ToolOrchestrator {
    registry: ToolRegistry,
    notifier: EventNotifier,
    retry: RetryPolicy,
    history: Mutex<Vec<Execution>>,
    history_limit: Option<usize>,
}

impl ToolOrchestrator {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            notifier: EventNotifier::new(),
            retry: RetryPolicy::default(),
            history: Mutex::new(Vec::new()),
            history_limit: None,
        }
    }

    pub fn with_notifier(mut self, notifier: EventNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Keep at most `limit` executions, dropping the oldest first
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<Execution>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of finished executions, oldest first
    pub fn history(&self) -> Vec<Execution> {
        self.lock_history().clone()
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    pub fn clear_history(&self) {
        self.lock_history().clear();
    }

    fn record(&self, execution: Execution) {
        debug!(
            "ToolOrchestrator: recorded {} ({}) as {}",
            execution.id, execution.tool, execution.status
        );
        let mut history = self.lock_history();
        history.push(execution);
        if let Some(limit) = self.history_limit
            && history.len() > limit
        {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
    }

    fn tool_event(execution: &Execution, attempt: u32, message: String) -> ToolEvent {
        ToolEvent {
            execution_id: execution.id.clone(),
            tool: execution.tool.clone(),
            args: execution.args.clone(),
            message,
            attempt,
            result: None,
            error: None,
        }
    }

    /// Fail a not-yet-started or running execution, notify and record it
    fn reject(&self, mut execution: Execution, attempt: u32, error: ToolError) -> Result<Value, ToolError> {
        let message = error.to_string();
        execution.fail(message.clone())?;

        let mut event = Self::tool_event(&execution, attempt, message.clone());
        event.error = Some(message);
        self.notifier.tool_error(&event);

        self.record(execution);
        Err(error)
    }

    /// Run one tool once: resolve, notify, validate, invoke, record
    pub async fn execute_tool(&self, name: &str, args: Value, ctx: &mut ExecutionContext) -> Result<Value, ToolError> {
        let attempt = ctx.attempt;
        let execution = Execution::new(name, args.clone(), attempt.saturating_sub(1));

        let Some(definition) = self.registry.get(name) else {
            warn!("ToolOrchestrator: unknown tool '{}'", name);
            return self.reject(execution, attempt, ToolError::NotFound { name: name.to_string() });
        };

        let start_message = render_template(&definition.messages.executing, &args);
        self.notifier
            .tool_start(&Self::tool_event(&execution, attempt, start_message));

        if let Err(e) = definition.parameters.validate(name, &args) {
            debug!("ToolOrchestrator: {}", e);
            return self.reject(execution, attempt, e);
        }

        let mut execution = execution;
        execution.start()?;
        debug!("ToolOrchestrator: running {} as {} (attempt {})", name, execution.id, attempt);

        match definition.handler.call(args.clone(), ctx).await {
            Ok(value) => {
                execution.complete(value.clone())?;

                let mut event = Self::tool_event(&execution, attempt, render_template(&definition.messages.completed, &args));
                event.result = Some(value.clone());
                self.notifier.tool_complete(&event);

                self.record(execution);
                Ok(value)
            }
            Err(e) => {
                // a non-retryable ToolError raised inside the handler keeps its kind
                let error = e
                    .chain()
                    .filter_map(|cause| cause.downcast_ref::<ToolError>())
                    .find(|inner| !inner.is_retryable())
                    .cloned()
                    .unwrap_or_else(|| ToolError::Execution {
                        tool: name.to_string(),
                        message: format!("{:#}", e),
                    });
                self.reject(execution, attempt, error)
            }
        }
    }

    /// Run a tool, retrying implementation failures with linear backoff
    ///
    /// Every failed attempt is appended to `ctx.error_history` before the
    /// next one starts. Validation and lookup failures are not retried.
    pub async fn execute_tool_with_retry(
        &self,
        name: &str,
        args: Value,
        ctx: &mut ExecutionContext,
    ) -> Result<Value, ToolError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            ctx.attempt = attempt;
            let error = match self.execute_tool(name, args.clone(), ctx).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            ctx.record_error(attempt, error.to_string());

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= max_attempts {
                warn!("ToolOrchestrator: {} failed after {} attempts: {}", name, attempt, error);
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                "ToolOrchestrator: {} attempt {}/{} failed, retrying in {:?}: {}",
                name, attempt, max_attempts, delay, error
            );
            self.notifier.tool_progress(&ToolEvent {
                tool: name.to_string(),
                args: args.clone(),
                message: format!("Retrying {} (attempt {}/{})", name, attempt + 1, max_attempts),
                attempt: attempt + 1,
                error: Some(error.to_string()),
                ..Default::default()
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Run planned calls in order, halting at the first step that fails
    pub async fn execute_tool_chain(&self, calls: &[ToolCallPlan]) -> ChainResult {
        let chain_id = generate_chain_id();
        let total_steps = calls.len();
        info!("ToolOrchestrator: chain {} starting with {} steps", chain_id, total_steps);

        self.notifier.chain_start(&ChainEvent {
            chain_id: chain_id.clone(),
            total_steps,
            ..Default::default()
        });

        let mut results: Vec<StepResult> = Vec::with_capacity(total_steps);
        let mut abort = None;

        for (index, call) in calls.iter().enumerate() {
            self.notifier.chain_progress(&ChainEvent {
                chain_id: chain_id.clone(),
                total_steps,
                step_index: Some(index),
                tool: Some(call.tool.clone()),
                success: None,
            });

            let mut ctx = ExecutionContext::new().with_previous_results(results.clone());
            match self.execute_tool_with_retry(&call.tool, call.args.clone(), &mut ctx).await {
                Ok(value) => results.push(StepResult::success(&call.tool, value)),
                Err(e) => {
                    let message = e.to_string();
                    warn!("ToolOrchestrator: chain {} halted at step {} ({}): {}", chain_id, index, call.tool, message);
                    results.push(StepResult::failure(&call.tool, message.clone()));
                    abort = Some(ChainAbort {
                        step: index,
                        tool: call.tool.clone(),
                        message,
                    });
                    break;
                }
            }
        }

        let success = results.iter().all(|r| r.success);
        info!(
            "ToolOrchestrator: chain {} finished, {}/{} steps run, success={}",
            chain_id,
            results.len(),
            total_steps,
            success
        );

        self.notifier.chain_complete(&ChainEvent {
            chain_id: chain_id.clone(),
            total_steps,
            step_index: None,
            tool: None,
            success: Some(success),
        });

        ChainResult {
            chain_id,
            success,
            results,
            abort,
        }
    }
}

impl std::fmt::Debug for ToolOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolOrchestrator")
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .field("history_len", &self.history_len())
            .finish()
    }
}
