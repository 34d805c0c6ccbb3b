use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tabpilot::llm::{GenerationParams, ModelConfiguration, ProviderKind};
use tabpilot::tools::{EventNotifier, RetryPolicy, ToolOrchestrator, ToolRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Environment variable holding the credential; provider default when unset
    pub api_key_env: Option<String>,
    pub api_version: Option<String>,
    pub params: GenerationParams,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::AzureOpenAi,
            endpoint: String::new(),
            model: "gpt-4o".to_string(),
            api_key: None,
            api_key_env: None,
            api_version: None,
            params: GenerationParams::default(),
            timeout_ms: 120000,
        }
    }
}

impl LlmConfig {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    /// Explicit key first, then the configured environment variable
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| lookup(self.api_key_env()).filter(|k| !k.is_empty()))
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn to_model_configuration(&self) -> Result<ModelConfiguration> {
        self.build_model_configuration(self.resolve_api_key())
    }

    fn build_model_configuration(&self, api_key: Option<String>) -> Result<ModelConfiguration> {
        let api_key = api_key.ok_or_else(|| {
            eyre!(
                "No API key for {}: set llm.api_key or the {} environment variable",
                self.provider,
                self.api_key_env()
            )
        })?;

        let mut config = ModelConfiguration::new(self.provider, &self.endpoint, api_key, &self.model)
            .with_params(self.params.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms));
        if let Some(version) = &self.api_version {
            config = config.with_api_version(version);
        }

        config.validate().context("Invalid llm configuration")?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub history_limit: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            history_limit: 100,
        }
    }
}

impl ToolsConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    /// Orchestrator over `registry` with the configured retry policy and history cap
    pub fn orchestrator(&self, registry: ToolRegistry, notifier: EventNotifier) -> ToolOrchestrator {
        ToolOrchestrator::new(registry)
            .with_notifier(notifier)
            .with_retry_policy(self.retry_policy())
            .with_history_limit(self.history_limit)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ProviderKind::AzureOpenAi);
        assert_eq!(config.tools.max_retries, 3);
        assert_eq!(config.tools.retry_policy().delay_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_orchestrator_uses_tools_section() {
        let tools = ToolsConfig {
            max_retries: 1,
            retry_delay_ms: 250,
            history_limit: 2,
        };
        let orch = tools.orchestrator(ToolRegistry::new(), EventNotifier::new());
        assert_eq!(orch.retry_policy().max_attempts(), 2);
        assert_eq!(orch.retry_policy().delay_for(1), Duration::from_millis(250));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
llm:
  provider: anthropic
  endpoint: https://api.anthropic.com/v1/messages
  model: claude-sonnet-4-20250514
  params:
    max_tokens: 1024
tools:
  max_retries: 1
"#,
        );

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Anthropic);
        assert_eq!(config.llm.params.max_tokens, 1024);
        assert_eq!(config.llm.params.temperature, 0.7);
        assert_eq!(config.llm.timeout_ms, 120000);
        assert_eq!(config.tools.max_retries, 1);
        assert_eq!(config.tools.retry_delay_ms, 1000);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let file = write_config("llm: [not, a, map]");
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        let llm = LlmConfig {
            api_key: Some("from-file".to_string()),
            ..Default::default()
        };
        assert_eq!(
            llm.resolve_api_key_with(|_| Some("from-env".to_string())).as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn test_resolve_api_key_uses_provider_env() {
        let llm = LlmConfig {
            provider: ProviderKind::Anthropic,
            ..Default::default()
        };
        let key = llm.resolve_api_key_with(|name| (name == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string()));
        assert_eq!(key.as_deref(), Some("sk-test"));

        let custom = LlmConfig {
            api_key_env: Some("MY_KEY".to_string()),
            ..Default::default()
        };
        assert_eq!(custom.api_key_env(), "MY_KEY");
        assert!(custom.resolve_api_key_with(|_| None).is_none());
    }

    #[test]
    fn test_model_configuration() {
        let llm = LlmConfig {
            endpoint: "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions".to_string(),
            api_version: Some("2024-06-01".to_string()),
            timeout_ms: 5000,
            ..Default::default()
        };

        let config = llm.build_model_configuration(Some("key".to_string())).unwrap();
        assert_eq!(config.api_version(), "2024-06-01");
        assert_eq!(config.timeout, Duration::from_secs(5));

        let err = llm.build_model_configuration(None).unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn test_model_configuration_rejects_empty_endpoint() {
        let llm = LlmConfig::default();
        assert!(llm.build_model_configuration(Some("key".to_string())).is_err());
    }
}
