//! Tool registry - the shared name → definition map
//!
//! Cloning the registry clones the handle, not the map. Locks are held only
//! for the map operation itself, never across an await, so a running tool can
//! register new tools. Tools that need the registry they live in hold a
//! `WeakToolRegistry` so the map is freed once the last owner drops it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use log::{debug, info};
use serde_json::Value;

use super::definition::ToolDefinition;

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<ToolDefinition>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-owning handle to the same map
    pub fn downgrade(&self) -> WeakToolRegistry {
        WeakToolRegistry {
            tools: Arc::downgrade(&self.tools),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ToolDefinition>>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ToolDefinition>>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a tool, replacing any entry with the same name.
    ///
    /// Returns true when an existing definition was replaced.
    pub fn register(&self, definition: ToolDefinition) -> bool {
        let name = definition.name.clone();
        let replaced = self.write().insert(name.clone(), Arc::new(definition)).is_some();
        if replaced {
            info!("ToolRegistry: replaced tool '{}'", name);
        } else {
            debug!("ToolRegistry: registered tool '{}'", name);
        }
        replaced
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of all definitions, sorted by name
    pub fn definitions(&self) -> Vec<Arc<ToolDefinition>> {
        let mut definitions: Vec<Arc<ToolDefinition>> = self.read().values().cloned().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Function schemas for every tool, for handing to a model
    pub fn function_schemas(&self) -> Vec<Value> {
        self.definitions().iter().map(|d| d.to_function_schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Handle that does not keep the registry alive
#[derive(Clone, Debug)]
pub struct WeakToolRegistry {
    tools: Weak<RwLock<HashMap<String, Arc<ToolDefinition>>>>,
}

impl WeakToolRegistry {
    /// `None` once every `ToolRegistry` handle has been dropped
    pub fn upgrade(&self) -> Option<ToolRegistry> {
        self.tools.upgrade().map(|tools| ToolRegistry { tools })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definition::handler_fn;
    use serde_json::json;

    fn tool(name: &str, tag: &'static str) -> ToolDefinition {
        ToolDefinition::new(name, tag, handler_fn(move |_, _| async move { Ok(json!(tag)) }))
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
        assert!(registry.get("search").is_none());
    }

    #[test]
    fn test_register_and_get() {
        let registry = ToolRegistry::new();
        assert!(!registry.register(tool("search", "v1")));
        assert!(registry.contains("search"));
        assert_eq!(registry.get("search").unwrap().description, "v1");
    }

    #[test]
    fn test_reregister_replaces_without_duplicates() {
        let registry = ToolRegistry::new();
        registry.register(tool("search", "v1"));
        assert!(registry.register(tool("search", "v2")));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("search").unwrap().description, "v2");
    }

    #[test]
    fn test_clone_shares_map() {
        let registry = ToolRegistry::new();
        let handle = registry.clone();
        handle.register(tool("open_tab", "x"));
        assert!(registry.contains("open_tab"));
    }

    #[test]
    fn test_weak_handle_does_not_keep_map_alive() {
        let registry = ToolRegistry::new();
        let weak = registry.downgrade();

        weak.upgrade().unwrap().register(tool("search", "x"));
        assert!(registry.contains("search"));

        drop(registry);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_names_sorted_and_unregister() {
        let registry = ToolRegistry::new();
        registry.register(tool("search", "a"));
        registry.register(tool("extract_page_content", "b"));
        registry.register(tool("open_tab", "c"));

        assert_eq!(registry.names(), vec!["extract_page_content", "open_tab", "search"]);
        assert!(registry.unregister("open_tab").is_some());
        assert!(registry.unregister("open_tab").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_function_schemas() {
        let registry = ToolRegistry::new();
        registry.register(tool("b_tool", "b"));
        registry.register(tool("a_tool", "a"));

        let schemas = registry.function_schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0]["name"], "a_tool");
        assert_eq!(schemas[1]["function"]["description"], "b");
    }
}
