//! generate_tool - meta-tool that registers new tools at runtime
//!
//! A generated tool is a named, schema-checked shortcut onto an existing
//! tool: its own arguments are rendered into the target's argument template
//! and the target's implementation is looked up when the tool is called.
//! Plans whose target chain leads back to the new tool are refused, and a
//! chain formed later by re-registration stops at `MAX_DELEGATION_DEPTH`.

use async_trait::async_trait;
use eyre::{Context, bail, eyre};
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::tools::context::{ExecutionContext, ToolError};
use crate::tools::definition::{
    ParamType, ParameterSchema, ToolDefinition, ToolFlags, ToolHandler, ToolMessages, handler_fn,
};
use crate::tools::registry::{ToolRegistry, WeakToolRegistry};
use crate::tools::template::render_value;

pub const GENERATE_TOOL_NAME: &str = "generate_tool";

/// Deepest chain of generated tools one call may pass through
pub const MAX_DELEGATION_DEPTH: u64 = 8;

const DEPTH_KEY: &str = "delegation_depth";

fn upgrade(registry: &WeakToolRegistry) -> eyre::Result<ToolRegistry> {
    registry.upgrade().ok_or_else(|| eyre!("tool registry has been dropped"))
}

/// Implementation of a tool created by `generate_tool`
struct GeneratedTool {
    name: String,
    target: String,
    /// `None` forwards the caller's arguments unchanged
    target_args: Option<Value>,
    registry: WeakToolRegistry,
}

#[async_trait]
impl ToolHandler for GeneratedTool {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> eyre::Result<Value> {
        let depth = ctx.metadata.get(DEPTH_KEY).and_then(Value::as_u64).unwrap_or(0) + 1;
        if depth > MAX_DELEGATION_DEPTH {
            warn!("{}: delegation depth {} exceeded", self.name, MAX_DELEGATION_DEPTH);
            return Err(ToolError::InvalidDefinition(format!(
                "'{}' delegates more than {} levels deep; its target chain is probably a cycle",
                self.name, MAX_DELEGATION_DEPTH
            ))
            .into());
        }

        let target = upgrade(&self.registry)?
            .get(&self.target)
            .ok_or_else(|| eyre!("target tool '{}' is no longer registered", self.target))?;

        let rendered = match &self.target_args {
            Some(template) => render_value(template, &args),
            None => args,
        };
        target.parameters.validate(&target.name, &rendered)?;
        debug!("{}: delegating to {} with {}", self.name, self.target, rendered);

        let nested = ctx.clone().with_metadata(DEPTH_KEY, json!(depth));
        target
            .handler
            .call(rendered, &nested)
            .await
            .wrap_err_with(|| format!("generated tool '{}' failed in '{}'", self.name, self.target))
    }

    fn delegate(&self) -> Option<&str> {
        Some(&self.target)
    }
}

/// Refuse a `name -> target` plan whose delegation chain reaches `name`
fn check_cycle(registry: &ToolRegistry, name: &str, target: &str) -> eyre::Result<()> {
    let mut path = vec![name.to_string(), target.to_string()];
    let mut current = registry.get(target);

    while let Some(def) = current {
        let Some(next) = def.handler.delegate() else {
            return Ok(());
        };
        let seen = path.iter().any(|n| n == next);
        path.push(next.to_string());
        if seen {
            bail!("tool '{}' would form a delegation cycle: {}", name, path.join(" -> "));
        }
        current = registry.get(next);
    }
    Ok(())
}

pub fn definition(registry: WeakToolRegistry) -> ToolDefinition {
    let handler = handler_fn(move |args: Value, _ctx| {
        let registry = registry.clone();
        async move { generate(&upgrade(&registry)?, &args) }
    });

    ToolDefinition::new(
        GENERATE_TOOL_NAME,
        "Create and register a new tool that calls an existing tool with templated arguments.",
        handler,
    )
    .with_parameters(
        ParameterSchema::new()
            .required("name", ParamType::String, "Name of the new tool")
            .required("description", ParamType::String, "What the new tool does")
            .optional("parameters", ParamType::Object, "JSON schema of the new tool's parameters")
            .required("target_tool", ParamType::String, "Existing tool the new tool calls")
            .optional(
                "target_args",
                ParamType::Object,
                "Arguments for the target tool; string values may use {{{param}}} placeholders",
            ),
    )
    .with_messages(ToolMessages {
        pending: "Preparing tool {{{name}}}".to_string(),
        executing: "Creating tool {{{name}}}".to_string(),
        completed: "Created tool {{{name}}}".to_string(),
    })
}

fn generate(registry: &ToolRegistry, args: &Value) -> eyre::Result<Value> {
    let name = args["name"].as_str().ok_or_else(|| eyre!("name is required"))?.trim();
    let description = args["description"].as_str().unwrap_or_default();
    let target = args["target_tool"]
        .as_str()
        .ok_or_else(|| eyre!("target_tool is required"))?
        .trim();

    if name.is_empty() {
        bail!("tool name must not be empty");
    }
    if name == GENERATE_TOOL_NAME {
        bail!("'{}' cannot be overwritten", GENERATE_TOOL_NAME);
    }
    if name == target {
        bail!("tool '{}' cannot target itself", name);
    }

    let Some(target_def) = registry.get(target) else {
        bail!("target tool '{}' is not registered", target);
    };
    check_cycle(registry, name, target)?;

    let parameters = match &args["parameters"] {
        Value::Null => ParameterSchema::new(),
        schema => ParameterSchema::from_json_schema(schema).wrap_err("invalid parameters schema")?,
    };
    let target_args = match &args["target_args"] {
        Value::Null => None,
        template => Some(template.clone()),
    };

    let handler: Arc<dyn ToolHandler> = Arc::new(GeneratedTool {
        name: name.to_string(),
        target: target.to_string(),
        target_args,
        registry: registry.downgrade(),
    });

    let definition = ToolDefinition::new(name, description, handler)
        .with_parameters(parameters)
        .with_messages(ToolMessages::for_tool(name))
        .with_flags(ToolFlags {
            is_instant: false,
            ..target_def.flags
        });

    let replaced = registry.register(definition);
    info!("generate_tool: registered '{}' -> '{}' (replaced={})", name, target, replaced);

    Ok(json!({
        "registered": name,
        "target_tool": target,
        "replaced": replaced,
    }))
}
