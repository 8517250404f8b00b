//! Questwright configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::schema::StaticGoalRegistry;

/// Main Questwright configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generative backend configuration
    pub llm: LlmConfig,

    /// Conversation engine tuning
    pub engine: EngineConfig,

    /// Conversation storage
    pub storage: StorageConfig,

    /// Optional YAML file with goal schemas (replaces the built-in goals)
    pub goals: Option<PathBuf>,

    /// Optional directory with `.pmt` prompt overrides
    pub prompts: Option<PathBuf>,

    /// Optional file with world lore merged into generation instructions
    pub lore: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .questwright.yml
        let local_config = PathBuf::from(".questwright.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/questwright/questwright.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("questwright").join("questwright.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => PathBuf::from(".questwright.yml"),
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Goals from the configured file, or the built-in set
    pub fn load_goals(&self) -> Result<StaticGoalRegistry> {
        debug!(goals = ?self.goals, "load_goals: called");
        match &self.goals {
            Some(path) => {
                StaticGoalRegistry::load(path).context(format!("Failed to load goals from {}", path.display()))
            }
            None => StaticGoalRegistry::builtin().context("Failed to load built-in goals"),
        }
    }

    /// Read the lore file, empty when none is configured
    pub fn load_lore(&self) -> Result<String> {
        debug!(lore = ?self.lore, "load_lore: called");
        match &self.lore {
            Some(path) => fs::read_to_string(path).context(format!("Failed to read lore file {}", path.display())),
            None => Ok(String::new()),
        }
    }
}

/// Generative backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("ollama" or "openai" for OpenAI-compatible servers)
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing an API key, if the server wants one
    #[serde(rename = "api-key-env")]
    pub api_key_env: Option<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries for transient failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key_env: None,
            timeout_ms: 120_000,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env.as_ref().and_then(|name| std::env::var(name).ok())
    }
}

/// Sampling temperatures per stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperatures {
    pub diagnosis: f32,
    pub extraction: f32,
    pub question: f32,
    pub execution: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            diagnosis: 0.1,
            extraction: 0.1,
            question: 0.7,
            execution: 0.5,
        }
    }
}

/// Conversation engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of most recent history entries shown to the diagnosis prompt
    #[serde(rename = "history-window")]
    pub history_window: usize,

    /// Sampling temperatures per stage
    pub temperatures: Temperatures,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            temperatures: Temperatures::default(),
        }
    }
}

/// Conversation storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON document per conversation
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("questwright")
                .join("conversations"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.engine.history_window, 6);
        assert!(config.engine.temperatures.diagnosis < config.engine.temperatures.question);
        assert!(config.goals.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  model: mistral
  base-url: http://127.0.0.1:8080
engine:
  temperatures:
    question: 0.9
log-level: debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.engine.temperatures.question, 0.9);
        assert_eq!(config.engine.temperatures.extraction, 0.1);
        assert_eq!(config.engine.history_window, 6);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("qw.yml");
        fs::write(&path, "storage:\n  path: /tmp/qw-test\nlog-level: WARN\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/tmp/qw-test"));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("WARN"));
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let missing = PathBuf::from("/definitely/not/here.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_lore() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lore.md");
        fs::write(&path, "Kolonia Górnicza").unwrap();

        let config = Config {
            lore: Some(path),
            ..Default::default()
        };
        assert_eq!(config.load_lore().unwrap(), "Kolonia Górnicza");
        assert_eq!(Config::default().load_lore().unwrap(), "");
    }
}
