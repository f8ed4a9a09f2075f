//! Client configuration file support.
//!
//! Provides the configuration structure and loading for endpoints and
//! logging.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upload endpoint used when nothing else is configured.
pub const DEFAULT_UPLOAD_URL: &str = "http://localhost:8000/upload";

/// Streaming endpoint used when nothing else is configured.
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8000/ws";

/// Environment variable overriding the upload endpoint.
pub const UPLOAD_URL_ENV: &str = "TRAINCTL_UPLOAD_URL";

/// Environment variable overriding the streaming endpoint.
pub const STREAM_URL_ENV: &str = "TRAINCTL_STREAM_URL";

/// Client configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Multipart upload endpoint
    #[serde(default)]
    pub upload_url: Option<String>,

    /// WebSocket endpoint of the training stream
    #[serde(default)]
    pub stream_url: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output format configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format (human, json)
    #[serde(default = "default_output_format")]
    pub format: String,
}

fn default_output_format() -> String {
    "human".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { format: default_output_format() }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read or write configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::ReadError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::ReadError(format!("Failed to write file: {}", e)))?;

        Ok(())
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".trainctl")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".trainctlrc")
    }

    /// Discover and load configuration.
    ///
    /// Loads, in increasing precedence:
    /// 1. Global config (~/.trainctl/config.toml)
    /// 2. Local config (./.trainctlrc)
    /// 3. `TRAINCTL_UPLOAD_URL` / `TRAINCTL_STREAM_URL`
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        if let Ok(global_config) = Self::load_from_file(&Self::default_global_path()) {
            config.merge(&global_config);
        }

        if let Ok(local_config) = Self::load_from_file(&Self::default_local_path()) {
            config.merge(&local_config);
        }

        config.merge(&Self::from_env());
        config
    }

    /// Endpoint overrides taken from the environment.
    pub fn from_env() -> Self {
        Self {
            upload_url: std::env::var(UPLOAD_URL_ENV).ok().filter(|v| !v.trim().is_empty()),
            stream_url: std::env::var(STREAM_URL_ENV).ok().filter(|v| !v.trim().is_empty()),
            ..Self::default()
        }
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref upload_url) = other.upload_url {
            self.upload_url = Some(upload_url.clone());
        }
        if let Some(ref stream_url) = other.stream_url {
            self.stream_url = Some(stream_url.clone());
        }
        if let Some(ref log_level) = other.log_level {
            self.log_level = Some(log_level.clone());
        }
        if other.output.format != "human" {
            self.output.format = other.output.format.clone();
        }
    }

    pub fn upload_url(&self) -> &str {
        self.upload_url.as_deref().unwrap_or(DEFAULT_UPLOAD_URL)
    }

    pub fn stream_url(&self) -> &str {
        self.stream_url.as_deref().unwrap_or(DEFAULT_STREAM_URL)
    }

    pub fn wants_json(&self) -> bool {
        self.output.format.eq_ignore_ascii_case("json")
    }
}
