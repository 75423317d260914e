//! Maeum configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::SamplingParams;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Terminal UI configuration
    pub ui: UiConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        match self.llm.provider.as_str() {
            "openai" | "anthropic" => {}
            other => {
                return Err(eyre::eyre!(
                    "Unknown LLM provider '{}' in config. Supported: openai, anthropic",
                    other
                ));
            }
        }
        self.llm.get_api_key().map(|_| ())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .maeum.yml
        let local_config = PathBuf::from(".maeum.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/maeum/maeum.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("maeum").join("maeum.yml");
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
    /// Errors are swallowed; a broken config file is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".maeum.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("maeum").join("maeum.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Endpoint, model and key variable used when the config leaves them unset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub model: &'static str,
    pub api_key_env: &'static str,
    pub base_url: &'static str,
}

impl ProviderDefaults {
    pub const OPENAI: Self = Self {
        model: "gpt-5-mini",
        api_key_env: "OPENAI_API_KEY",
        base_url: "https://api.openai.com",
    };

    pub const ANTHROPIC: Self = Self {
        model: "claude-sonnet-4-20250514",
        api_key_env: "ANTHROPIC_API_KEY",
        base_url: "https://api.anthropic.com",
    };

    /// Defaults for a provider name, `None` if the provider is unknown
    pub fn for_provider(provider: &str) -> Option<Self> {
        match provider {
            "openai" => Some(Self::OPENAI),
            "anthropic" => Some(Self::ANTHROPIC),
            _ => None,
        }
    }
}

/// LLM provider configuration
///
/// `model`, `api-key-env` and `base-url` follow the provider when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key given inline; takes precedence over env and file
    #[serde(rename = "api-key", skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// File containing the API key, used when the environment variable is unset
    #[serde(rename = "api-key-file")]
    pub api_key_file: Option<String>,

    /// API base URL
    #[serde(rename = "base-url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub temperature: f64,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    #[serde(rename = "presence-penalty")]
    pub presence_penalty: f64,

    #[serde(rename = "frequency-penalty")]
    pub frequency_penalty: f64,

    /// Request timeout in milliseconds; no timeout when unset
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let sampling = SamplingParams::default();
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key: None,
            api_key_env: None,
            api_key_file: None,
            base_url: None,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            presence_penalty: sampling.presence_penalty,
            frequency_penalty: sampling.frequency_penalty,
            timeout_ms: None,
        }
    }
}

impl LlmConfig {
    fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults::for_provider(&self.provider).unwrap_or(ProviderDefaults::OPENAI)
    }

    /// Model to request, falling back to the provider's default
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.defaults().model)
    }

    /// Environment variable holding the key, falling back to the provider's default
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(self.defaults().api_key_env)
    }

    /// API base URL, falling back to the provider's default
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.defaults().base_url)
    }

    /// Resolve the API key: inline value, then environment variable, then key file
    pub fn get_api_key(&self) -> Result<String> {
        let api_key_env = self.api_key_env();
        debug!(%api_key_env, "LlmConfig::get_api_key: called");
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            debug!("get_api_key: using inline key");
            return Ok(key.to_string());
        }

        if let Ok(key) = std::env::var(api_key_env) {
            let key = key.trim();
            if !key.is_empty() {
                debug!("get_api_key: using environment variable");
                return Ok(key.to_string());
            }
        }

        if let Some(file) = &self.api_key_file {
            let path = expand_home(file);
            let key = fs::read_to_string(&path).context(format!(
                "LLM API key not found. {} is unset and {} could not be read",
                api_key_env,
                path.display()
            ))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(eyre::eyre!("LLM API key file {} is empty", path.display()));
            }
            debug!("get_api_key: using key file");
            return Ok(key.to_string());
        }

        Err(eyre::eyre!(
            "LLM API key not found. Set the {} environment variable or api-key-file in the config.",
            api_key_env
        ))
    }

    /// Sampling parameters sent with every request
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Terminal UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Event loop tick rate in milliseconds
    #[serde(rename = "tick-rate-ms")]
    pub tick_rate_ms: u64,

    /// Start with the help panel open
    #[serde(rename = "help-expanded")]
    pub help_expanded: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 250,
            help_expanded: false,
        }
    }
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(10))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
