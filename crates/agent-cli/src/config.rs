//! Application configuration: optional TOML file, then environment.

use std::path::{Path, PathBuf};

use agent_core::AgentConfig;
use agent_runtime::{BridgeConfig, OllamaConfig};
use anyhow::Context;
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "tool-agent.toml";

pub const DEFAULT_MODEL: &str = "llama3.2";

/// ```toml
/// model = "qwen2.5"
///
/// [agent]
/// max_tool_turns = 5
/// tool_timeout = 20
///
/// [ollama]
/// host = "http://localhost"
/// port = 11434
///
/// [[bridges]]
/// name = "weather"
/// command = "tool-agent"
/// args = ["serve-tools", "--mock"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub model: String,
    pub system_prompt: Option<String>,
    pub agent: AgentConfig,
    pub ollama: OllamaConfig,
    pub bridges: Vec<BridgeConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            system_prompt: None,
            agent: AgentConfig::default(),
            ollama: OllamaConfig::default(),
            bridges: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`, or the default file when present, then apply env overrides.
    /// An explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let config = if explicit || path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))?;
            tracing::debug!(path = %path.display(), bridges = config.bridges.len(), "Loaded config");
            config
        } else {
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    /// `OLLAMA_HOST`, `OLLAMA_PORT` and `TOOL_AGENT_MODEL` win over the file
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.ollama = self.ollama.with_env_overrides();
        if let Ok(model) = std::env::var("TOOL_AGENT_MODEL") {
            self.model = model;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.agent.max_tool_turns, 10);
        assert_eq!(config.ollama.port, 11434);
        assert!(config.bridges.is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml(
            r#"
            model = "qwen2.5"

            [agent]
            max_tool_turns = 4
            tool_timeout = 2.5
            parallel_tool_calls = false

            [ollama]
            port = 11500

            [[bridges]]
            name = "weather"
            command = "tool-agent"
            args = ["serve-tools", "--mock"]
            shutdown_grace = 1

            [bridges.env]
            RUST_LOG = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.agent.max_tool_turns, 4);
        assert_eq!(config.agent.tool_timeout, Duration::from_millis(2500));
        assert!(!config.agent.parallel_tool_calls);
        assert_eq!(config.ollama.host, "http://localhost");
        assert_eq!(config.ollama.port, 11500);

        let bridge = &config.bridges[0];
        assert_eq!(bridge.name, "weather");
        assert_eq!(bridge.args, vec!["serve-tools", "--mock"]);
        assert_eq!(bridge.shutdown_grace, Duration::from_secs(1));
        assert_eq!(bridge.env.get("RUST_LOG").map(String::as_str), Some("debug"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(AppConfig::from_toml("modle = \"typo\"").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/tool-agent.toml"))).is_err());
    }
}
