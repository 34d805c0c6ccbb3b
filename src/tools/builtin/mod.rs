//! Built-in browser tools
//!
//! The tools here only describe and validate the call; the side effects go
//! through an injected `BrowserCapabilities` implementation.

mod extract_page_content;
mod generate_tool;
mod open_tab;
mod search;

use std::sync::Arc;

use async_trait::async_trait;
use eyre::bail;
use serde::{Deserialize, Serialize};

use super::registry::ToolRegistry;

pub use generate_tool::{GENERATE_TOOL_NAME, MAX_DELEGATION_DEPTH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    pub tab_id: u64,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub tab_id: u64,
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Side-effect surface the built-in tools act through
#[async_trait]
pub trait BrowserCapabilities: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> eyre::Result<Vec<SearchHit>>;

    async fn open_tab(&self, url: &str, active: bool) -> eyre::Result<TabInfo>;

    async fn extract_page_content(&self, tab_id: u64) -> eyre::Result<PageContent>;
}

/// Capabilities for hosts with no browser attached; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedBrowser;

#[async_trait]
impl BrowserCapabilities for DetachedBrowser {
    async fn search(&self, _query: &str, _max_results: usize) -> eyre::Result<Vec<SearchHit>> {
        bail!("no browser attached: search is unavailable")
    }

    async fn open_tab(&self, _url: &str, _active: bool) -> eyre::Result<TabInfo> {
        bail!("no browser attached: open_tab is unavailable")
    }

    async fn extract_page_content(&self, _tab_id: u64) -> eyre::Result<PageContent> {
        bail!("no browser attached: extract_page_content is unavailable")
    }
}

/// Install search, open_tab, extract_page_content and generate_tool
pub fn register_builtin_tools(registry: &ToolRegistry, browser: Arc<dyn BrowserCapabilities>) {
    registry.register(search::definition(browser.clone()));
    registry.register(open_tab::definition(browser.clone()));
    registry.register(extract_page_content::definition(browser));
    registry.register(generate_tool::definition(registry.downgrade()));
}
