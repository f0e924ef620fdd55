//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::predict::CurveConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Host API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the host platform's data API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.example.com/data/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// When set, the feature suppresses itself on matches the viewer plays in.
    #[serde(default)]
    pub focus_mode: bool,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub curve: CurveConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            focus_mode: false,
            api: ApiConfig::default(),
            curve: CurveConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "API timeout must be greater than 0".to_string(),
            ));
        }

        if self.curve.k_factor <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Curve k-factor must be positive".to_string(),
            ));
        }

        if self.curve.rating_scale <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Curve rating scale must be positive".to_string(),
            ));
        }

        if self.curve.curve_base <= 1.0 {
            return Err(ConfigError::ValidationError(
                "Curve base must be greater than 1".to_string(),
            ));
        }

        Ok(())
    }
}
