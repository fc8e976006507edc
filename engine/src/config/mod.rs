//! Configuration management
//!
//! Handles loading, validation, and management of the Parley configuration.
//! Configuration is stored in TOML format at ~/.parley/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Backend endpoints (OpenAI base URL and API key, Ollama base URL)
//! - **chat**: Default conversation settings (provider, model, word budget,
//!   starting quota)
//!
//! # Examples
//!
//! ```no_run
//! use parley_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Provider: {}", config.chat.provider);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::quota::{MAX_QUOTA, MIN_QUOTA};

/// Main configuration structure
///
/// Represents the complete configuration loaded from ~/.parley/config.toml.
/// Every section falls back to its defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Default conversation settings
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// OpenAI backend settings
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Ollama backend settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenAI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL for the OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// API key; falls back to the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Ollama backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

/// Default conversation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Default provider (openai or ollama)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Default model identifier
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Word budget per bot response
    #[serde(default = "default_max_response_length")]
    pub max_response_length: usize,

    /// Starting quota budget for a fresh conversation
    #[serde(default = "default_initial_quota")]
    pub initial_quota: i64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.parley")
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_response_length() -> usize {
    100
}

fn default_initial_quota() -> i64 {
    crate::quota::INITIAL_QUOTA
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: None,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            max_response_length: default_max_response_length(),
            initial_quota: default_initial_quota(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.parley/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default one.
    /// Validates the configuration after loading.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save it to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.parley/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".parley").join("config.toml"))
    }

    /// Validate fields and expand ~ in paths
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        match self.core.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(EngineError::Config(format!(
                    "Invalid log level '{}' (expected error, warn, info, debug, or trace)",
                    other
                )))
            }
        }

        self.chat
            .provider
            .parse::<crate::llm::Provider>()
            .map_err(|_| {
                EngineError::Config(format!(
                    "Invalid provider '{}' (expected openai or ollama)",
                    self.chat.provider
                ))
            })?;

        if self.chat.max_response_length == 0 {
            return Err(EngineError::Config(
                "chat.max_response_length must be greater than zero".to_string(),
            ));
        }

        if !(MIN_QUOTA..=MAX_QUOTA).contains(&self.chat.initial_quota) {
            return Err(EngineError::Config(format!(
                "chat.initial_quota must be in [{}, {}]",
                MIN_QUOTA, MAX_QUOTA
            )));
        }

        self.core.data_dir = expand_tilde(&self.core.data_dir)?;

        Ok(())
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_tilde(path: &Path) -> Result<PathBuf, EngineError> {
    let Ok(stripped) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };

    let home = dirs::home_dir()
        .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

    Ok(home.join(stripped))
}
