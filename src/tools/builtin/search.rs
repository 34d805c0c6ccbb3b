//! search tool - web search through the browser

use std::sync::Arc;

use eyre::eyre;
use log::debug;
use serde_json::{Value, json};

use super::BrowserCapabilities;
use crate::tools::definition::{ParamType, ParameterSchema, ToolDefinition, ToolFlags, ToolMessages, handler_fn};

const DEFAULT_MAX_RESULTS: u64 = 5;
const SNIPPET_CHARS: usize = 200;

pub fn definition(browser: Arc<dyn BrowserCapabilities>) -> ToolDefinition {
    let handler = handler_fn(move |args: Value, _ctx| {
        let browser = browser.clone();
        async move {
            let query = args["query"].as_str().ok_or_else(|| eyre!("query is required"))?;
            let max_results = args["max_results"].as_u64().unwrap_or(DEFAULT_MAX_RESULTS) as usize;
            debug!("search: query={:?} max_results={}", query, max_results);

            let hits = browser.search(query, max_results).await?;
            let results: Vec<Value> = hits
                .into_iter()
                .take(max_results)
                .map(|hit| {
                    json!({
                        "title": hit.title,
                        "url": hit.url,
                        "snippet": truncate(&hit.snippet, SNIPPET_CHARS),
                    })
                })
                .collect();

            Ok(json!({ "query": query, "count": results.len(), "results": results }))
        }
    });

    ToolDefinition::new("search", "Search the web and return the top results.", handler)
        .with_parameters(
            ParameterSchema::new()
                .required("query", ParamType::String, "Search query")
                .optional("max_results", ParamType::Integer, "Maximum results to return (default: 5)"),
        )
        .with_messages(ToolMessages {
            pending: "Preparing to search for {{{query}}}".to_string(),
            executing: "Searching for {{{query}}}".to_string(),
            completed: "Searched for {{{query}}}".to_string(),
        })
        .with_flags(ToolFlags {
            readonly: true,
            is_instant: false,
            requires_confirmation: false,
        })
}

/// Truncate to at most `max` chars on a char boundary
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::fake::FakeBrowser;
    use crate::tools::context::ExecutionContext;

    #[tokio::test]
    async fn test_search_returns_results() {
        let browser = Arc::new(FakeBrowser::default());
        let def = definition(browser.clone());

        let out = def
            .handler
            .call(json!({"query": "tokio", "max_results": 1}), &ExecutionContext::new())
            .await
            .unwrap();

        assert_eq!(out["count"], 1);
        assert_eq!(out["results"][0]["title"], "tokio result 0");
        assert_eq!(browser.calls(), vec!["search:tokio:1"]);
    }

    #[tokio::test]
    async fn test_search_default_limit_and_snippet_truncation() {
        let browser = Arc::new(FakeBrowser::default());
        let def = definition(browser.clone());

        let out = def.handler.call(json!({"query": "q"}), &ExecutionContext::new()).await.unwrap();
        assert_eq!(browser.calls(), vec!["search:q:5"]);

        let snippet = out["results"][0]["snippet"].as_str().unwrap();
        assert_eq!(snippet.chars().count(), SNIPPET_CHARS + 3);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn test_search_schema() {
        let def = definition(Arc::new(FakeBrowser::default()));
        assert_eq!(def.parameters.required, vec!["query"]);
        assert!(def.parameters.validate("search", &json!({"query": 1})).is_err());
    }
}
