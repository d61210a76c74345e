//! Configuration loading and management for besthit.
//!
//! Loads settings from `besthit.toml` with environment variable overrides for sensitive data.
//! Every section has defaults, so a missing or empty file is a valid configuration.

use crate::prompt::TemplateOverrides;
use crate::summarizer::{SelectionPolicy, SummarizerSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "besthit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// LLM provider, currently only "gemini"
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,
    /// System role sent with every generation and judge call
    pub system_prompt: String,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
}

/// Best-of-N summariser knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub num_tries: usize,
    pub has_title: bool,
    pub min_title_chars: usize,
    pub max_title_chars: usize,
    pub min_paragraphs: usize,
    pub max_paragraphs: usize,
    /// Target ratio of summary tokens to document tokens
    pub compression_rate: f64,
    /// Add LLM-judged correctness and completeness requirements
    pub judge_augmented: bool,
    pub selection: SelectionPolicy,
}

/// HTTP endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub templates: TemplateOverrides,
}

impl Config {
    /// Load configuration from the default location (besthit.toml in cwd or home)
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.api.gemini_key = Some(key);
        }
        self
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        let home_config = dirs::home_dir()?
            .join(".config")
            .join("besthit")
            .join(CONFIG_FILE);
        home_config.exists().then_some(home_config)
    }

    /// Get the API key for the configured provider
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.agent.provider.as_str() {
            "gemini" => self
                .api
                .gemini_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string())),
            other => Err(ConfigError::MissingApiKey(other.to_string())),
        }
    }

    /// Summariser settings described by the `[summarizer]` section
    pub fn summarizer_settings(&self) -> SummarizerSettings {
        let s = &self.summarizer;
        SummarizerSettings {
            num_tries: s.num_tries,
            has_title: s.has_title,
            min_title_chars: s.min_title_chars,
            max_title_chars: s.max_title_chars,
            min_paragraphs: s.min_paragraphs,
            max_paragraphs: s.max_paragraphs,
            compression_rate: s.compression_rate,
            judge_augmented: s.judge_augmented,
            selection: s.selection,
            system_prompt: self.agent.system_prompt.clone(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            system_prompt: crate::llm::SYSTEM_ROLE.to_string(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        let defaults = SummarizerSettings::default();
        Self {
            num_tries: defaults.num_tries,
            has_title: defaults.has_title,
            min_title_chars: defaults.min_title_chars,
            max_title_chars: defaults.max_title_chars,
            min_paragraphs: defaults.min_paragraphs,
            max_paragraphs: defaults.max_paragraphs,
            compression_rate: defaults.compression_rate,
            judge_augmented: defaults.judge_augmented,
            selection: defaults.selection,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
        }
    }
}
