//! Engine settings and provider configuration management

use crate::error::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
    #[serde(default = "default_active_provider")]
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_active_provider() -> String {
    "native".to_string()
}

/// Storage configuration for generated images
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_history_root")]
    pub history_root: String,
}

fn default_history_root() -> String {
    "./history".to_string()
}

/// Generation limits and retry budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Worker pool bound for concurrent page generation
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// End-to-end attempts per page at the orchestrator level
    #[serde(default = "default_page_attempts")]
    pub page_attempts: u32,
    /// Attempts per provider call inside each page attempt
    #[serde(default = "default_provider_attempts")]
    pub provider_attempts: u32,
    /// Capacity of the progress event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_concurrent() -> usize {
    15
}

fn default_page_attempts() -> u32 {
    3
}

fn default_provider_attempts() -> u32 {
    5
}

fn default_event_buffer() -> usize {
    32
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            page_attempts: default_page_attempts(),
            provider_attempts: default_provider_attempts(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// The closed set of supported provider protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Native multimodal image API (aspect ratio, temperature, reference images)
    NativeImage,
    /// OpenAI-Images-compatible REST endpoint
    OpenaiImage,
    /// OpenAI-Chat-compatible REST endpoint with image extraction from the reply
    OpenaiChat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeImage => "native_image",
            Self::OpenaiImage => "openai_image",
            Self::OpenaiChat => "openai_chat",
        }
    }
}

/// One resolved image provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Endpoint path for OpenAI-compatible providers. Accepts the
    /// shorthands "images" and "chat" or a verbatim path.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_size")]
    pub default_size: String,
    #[serde(default = "default_aspect_ratio")]
    pub default_aspect_ratio: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub high_concurrency: bool,
    #[serde(default)]
    pub short_prompt: bool,
}

fn default_size() -> String {
    "1024x1024".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("storage.history_root", default_history_root())
            .map_err(|e| EngineError::Config(e.to_string()))?
            .set_default("logging.level", default_log_level())
            .map_err(|e| EngineError::Config(e.to_string()))?
            .set_default("logging.format", default_log_format())
            .map_err(|e| EngineError::Config(e.to_string()))?
            // Load from configuration file
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with BLOG_IMG_)
            .add_source(
                Environment::with_prefix("BLOG_IMG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(settings)
    }

    /// Look up the active provider's configuration
    pub fn active_provider_config(&self) -> Result<&ProviderConfig> {
        self.providers.get(&self.active_provider).ok_or_else(|| {
            EngineError::Config(format!(
                "Active provider '{}' is not defined in the providers table",
                self.active_provider
            ))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.history_root.is_empty() {
            return Err(EngineError::Config(
                "storage.history_root cannot be empty".to_string(),
            ));
        }

        if self.generation.max_concurrent == 0 {
            return Err(EngineError::Config(
                "generation.max_concurrent must be at least 1".to_string(),
            ));
        }

        if !self.providers.is_empty() && !self.providers.contains_key(&self.active_provider) {
            return Err(EngineError::Config(format!(
                "Active provider '{}' is not defined in the providers table",
                self.active_provider
            )));
        }

        for (name, provider) in &self.providers {
            match provider.kind {
                ProviderKind::OpenaiImage | ProviderKind::OpenaiChat => {
                    if provider.base_url.as_deref().unwrap_or("").is_empty() {
                        return Err(EngineError::Config(format!(
                            "Provider '{}' requires a base_url",
                            name
                        )));
                    }
                }
                ProviderKind::NativeImage => {}
            }
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                history_root: default_history_root(),
            },
            generation: GenerationConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            active_provider: default_active_provider(),
            providers: HashMap::new(),
        }
    }
}
