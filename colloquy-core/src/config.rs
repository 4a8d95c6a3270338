//! Configuration types for Colloquy

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ColloquyError, Result};
use crate::persona::Persona;

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://openai-api.dataquest.io/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "models/openhermes-2.5-mistral-7b";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColloquyConfig {
    /// Completion endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-session defaults
    #[serde(default)]
    pub session: SessionConfig,

    /// History persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent with every request and used for token counting
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// API key. Prefer the environment; never written back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Timeout applied to each completion request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Per-session defaults, used when a request does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sampling temperature (0.0-2.0)
    pub temperature: f32,

    /// Maximum tokens the model may generate per reply
    pub max_output_tokens: usize,

    /// Maximum tokens the retained history may occupy
    pub token_budget: usize,

    /// Persona active when a session starts
    pub persona: Persona,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 500,
            token_budget: 1000,
            persona: Persona::SassyAssistant,
        }
    }
}

/// History persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding history files
    pub history_dir: PathBuf,

    /// History identifier (file name). Derived from the start time when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_dir: PathBuf::from("."),
            history_id: None,
        }
    }
}

impl ColloquyConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `colloquy.toml` in the working directory
    /// 3. File named by `COLLOQUY_CONFIG_PATH`
    /// 4. `COLLOQUY_`-prefixed environment variables (`__` separates sections)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or values fail validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(ColloquyConfig::default()))
            .merge(Toml::file("colloquy.toml"));

        if let Ok(path) = std::env::var("COLLOQUY_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ColloquyConfig = figment
            .merge(Env::prefixed("COLLOQUY_").ignore(&["config_path"]).split("__"))
            .extract()
            .map_err(|e| {
                ColloquyError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, layered over defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(ColloquyError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: ColloquyConfig = Figment::from(Serialized::defaults(ColloquyConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                ColloquyError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for out-of-range session values.
    pub fn validate(&self) -> Result<()> {
        validate_temperature(self.session.temperature)?;
        validate_positive("token_budget", self.session.token_budget)?;
        validate_positive("max_output_tokens", self.session.max_output_tokens)?;
        Ok(())
    }
}

pub(crate) fn validate_temperature(temperature: f32) -> Result<()> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ColloquyError::Validation(format!(
            "temperature must be between 0.0 and 2.0, got {}",
            temperature
        )));
    }
    Ok(())
}

pub(crate) fn validate_positive(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(ColloquyError::Validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}
