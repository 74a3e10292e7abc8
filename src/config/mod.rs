//! Configuration for the ai-client binary
//!
//! Values are resolved in priority order: command-line flags, environment
//! variables, `~/.ai-client/config.toml`, then built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::{apis as env_apis, defaults as env_defaults};
use crate::services::gemini::{ClientConfig, GeminiError};

pub mod defaults;
pub mod prompt_config;

pub use defaults::{get_default_templates, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
pub use prompt_config::{PromptError, PromptTemplate, PromptTemplates};

/// Configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<PromptTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl ConfigFile {
    /// Get the config file path (~/.ai-client/config.toml)
    pub fn get_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Could not find home directory")?;
        Ok(home_dir.join(".ai-client").join("config.toml"))
    }

    /// Load configuration from the default location.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Fully resolved settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub max_retries: Option<u32>,
    pub templates: PromptTemplates,
}

impl AppConfig {
    pub fn resolve(model_flag: Option<&str>, timeout_flag: Option<u64>) -> Result<Self> {
        let file = ConfigFile::load()?;
        Self::resolve_with(&file, model_flag, timeout_flag, |name| {
            std::env::var(name).ok()
        })
    }

    pub fn resolve_with(
        file: &ConfigFile,
        model_flag: Option<&str>,
        timeout_flag: Option<u64>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_key = ClientConfig::api_key_from(&env).or_else(|| {
            non_empty(file.api.gemini_api_key.clone()).map(|key| key.trim().to_string())
        });

        let model = model_flag
            .map(str::to_string)
            .or_else(|| non_empty(env(env_defaults::MODEL)))
            .or_else(|| non_empty(file.defaults.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match timeout_flag {
            Some(secs) => secs,
            None => match non_empty(env(env_defaults::TIMEOUT)) {
                Some(raw) => raw.trim().parse::<u64>().with_context(|| {
                    format!("{} must be a whole number of seconds, got '{raw}'", env_defaults::TIMEOUT)
                })?,
                None => file.defaults.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            },
        };

        if timeout_secs == 0 {
            anyhow::bail!("Timeout must be at least one second");
        }

        let mut templates = PromptTemplates::builtin();
        for template in &file.templates {
            templates
                .override_with(template.clone())
                .context("Invalid prompt template in config file")?;
        }

        Ok(Self {
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
            temperature: file.defaults.temperature,
            max_retries: file.defaults.max_retries,
            templates,
        })
    }

    /// Builds the client configuration, failing when no credential was found.
    pub fn client_config(&self) -> Result<ClientConfig, GeminiError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            GeminiError::configuration(format!(
                "Gemini API key is required (set {} or {}, or api.gemini_api_key in the config file)",
                env_apis::GEMINI_API_KEY,
                env_apis::GOOGLE_API_KEY
            ))
        })?;

        let mut config = ClientConfig::new(api_key);
        config.temperature = self.temperature;
        config.max_retries = self.max_retries;
        config.validate()?;
        Ok(config)
    }
}
