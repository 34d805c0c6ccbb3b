//! open_tab tool - open a URL in a new browser tab

use std::sync::Arc;

use eyre::{bail, eyre};
use log::info;
use serde_json::Value;

use super::BrowserCapabilities;
use crate::tools::definition::{ParamType, ParameterSchema, ToolDefinition, ToolFlags, ToolMessages, handler_fn};

pub fn definition(browser: Arc<dyn BrowserCapabilities>) -> ToolDefinition {
    let handler = handler_fn(move |args: Value, _ctx| {
        let browser = browser.clone();
        async move {
            let url = args["url"].as_str().ok_or_else(|| eyre!("url is required"))?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("only http(s) URLs can be opened, got '{}'", url);
            }
            let active = args["active"].as_bool().unwrap_or(true);

            let tab = browser.open_tab(url, active).await?;
            info!("open_tab: opened {} as tab {}", tab.url, tab.tab_id);
            Ok(serde_json::to_value(tab)?)
        }
    });

    ToolDefinition::new("open_tab", "Open a URL in a new browser tab.", handler)
        .with_parameters(
            ParameterSchema::new()
                .required("url", ParamType::String, "Absolute http(s) URL to open")
                .optional("active", ParamType::Boolean, "Focus the new tab (default: true)"),
        )
        .with_messages(ToolMessages {
            pending: "Preparing to open {{{url}}}".to_string(),
            executing: "Opening {{{url}}}".to_string(),
            completed: "Opened {{{url}}}".to_string(),
        })
        .with_flags(ToolFlags {
            readonly: false,
            is_instant: true,
            requires_confirmation: false,
        })
}
