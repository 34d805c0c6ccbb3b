//! extract_page_content tool - readable text of an open tab

use std::sync::Arc;

use eyre::eyre;
use log::debug;
use serde_json::{Value, json};

use super::BrowserCapabilities;
use crate::tools::definition::{ParamType, ParameterSchema, ToolDefinition, ToolFlags, ToolMessages, handler_fn};

const DEFAULT_MAX_CHARS: u64 = 20_000;

pub fn definition(browser: Arc<dyn BrowserCapabilities>) -> ToolDefinition {
    let handler = handler_fn(move |args: Value, _ctx| {
        let browser = browser.clone();
        async move {
            let tab_id = args["tab_id"].as_u64().ok_or_else(|| eyre!("tab_id must be a non-negative integer"))?;
            let max_chars = args["max_chars"].as_u64().unwrap_or(DEFAULT_MAX_CHARS) as usize;

            let page = browser.extract_page_content(tab_id).await?;
            let total_chars = page.text.chars().count();
            let text: String = page.text.chars().take(max_chars).collect();
            debug!("extract_page_content: tab {} has {} chars", tab_id, total_chars);

            Ok(json!({
                "tab_id": page.tab_id,
                "url": page.url,
                "title": page.title,
                "text": text,
                "truncated": total_chars > max_chars,
            }))
        }
    });

    ToolDefinition::new(
        "extract_page_content",
        "Extract the readable text content of an open tab.",
        handler,
    )
    .with_parameters(
        ParameterSchema::new()
            .required("tab_id", ParamType::Integer, "Id of the tab to read")
            .optional("max_chars", ParamType::Integer, "Maximum characters of text to return"),
    )
    .with_messages(ToolMessages {
        pending: "Preparing to read tab {{{tab_id}}}".to_string(),
        executing: "Reading tab {{{tab_id}}}".to_string(),
        completed: "Read tab {{{tab_id}}}".to_string(),
    })
    .with_flags(ToolFlags {
        readonly: true,
        is_instant: false,
        requires_confirmation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::fake::FakeBrowser;
    use crate::tools::context::ExecutionContext;

    #[tokio::test]
    async fn test_extract_truncates_on_char_boundary() {
        let browser = Arc::new(FakeBrowser::default());
        let def = definition(browser.clone());

        let out = def
            .handler
            .call(json!({"tab_id": 7, "max_chars": 5}), &ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(out["text"], "héllo");
        assert_eq!(out["truncated"], true);
        assert_eq!(out["title"], "Example");
        assert_eq!(browser.calls(), vec!["extract:7"]);
    }

    #[tokio::test]
    async fn test_extract_full_text() {
        let def = definition(Arc::new(FakeBrowser::default()));
        let out = def.handler.call(json!({"tab_id": 1}), &ExecutionContext::new()).await.unwrap();
        assert_eq!(out["truncated"], false);
        assert_eq!(out["text"].as_str().unwrap().chars().count(), 120);
    }

    #[tokio::test]
    async fn test_extract_requires_tab_id() {
        let def = definition(Arc::new(FakeBrowser::default()));
        let err = def.handler.call(json!({}), &ExecutionContext::new()).await.unwrap_err();
        assert!(err.to_string().contains("tab_id"));
    }
}
