//! Chain plans stored as JSON files: a list of `{tool, args}` steps

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::context::ToolError;
use super::orchestrator::{StepResult, ToolCallPlan, ToolOrchestrator};
use super::registry::ToolRegistry;
use crate::error::Result;

/// Read and parse a plan file
pub fn load_plan(path: &Path) -> Result<Vec<ToolCallPlan>> {
    let content = fs::read_to_string(path)?;
    let plan: Vec<ToolCallPlan> = serde_json::from_str(&content)?;
    debug!("load_plan: {} steps from {}", plan.len(), path.display());
    Ok(plan)
}

/// Check each step against the registry without running anything
///
/// Steps that name a tool registered by an earlier `generate_tool` step are
/// reported as unknown.
pub fn check_plan(registry: &ToolRegistry, plan: &[ToolCallPlan]) -> Vec<std::result::Result<(), ToolError>> {
    plan.iter()
        .map(|step| match registry.get(&step.tool) {
            None => Err(ToolError::NotFound {
                name: step.tool.clone(),
            }),
            Some(def) => def.parameters.validate(&def.name, &step.args),
        })
        .collect()
}

/// Run a plan as one chain; a halted chain becomes `ToolError::ChainAbort`
pub async fn run_plan(orchestrator: &ToolOrchestrator, plan: &[ToolCallPlan]) -> Result<Vec<StepResult>> {
    let chain = orchestrator.execute_tool_chain(plan).await;
    info!("run_plan: chain {} success={}", chain.chain_id, chain.success);
    Ok(chain.into_result()?)
}
