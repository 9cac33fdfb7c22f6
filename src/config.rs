//! Configuration parsing and structures

use std::path::Path;

use serde::Deserialize;

use crate::env::substitute_env_vars;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Connector configuration
    pub connector: DropboxConnectorConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Dropbox connector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DropboxConnectorConfig {
    /// Credential mode
    pub auth: AuthConfig,

    /// Override for the RPC host (for test servers)
    pub api_endpoint: Option<String>,

    /// Override for the upload/download host (for test servers)
    pub content_endpoint: Option<String>,

    /// Override for the oauth2 token endpoint (for test servers)
    pub token_endpoint: Option<String>,
}

/// The two supported credential modes
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Long-lived bearer access token used as-is
    AccessToken { access_token: String },

    /// Refresh token plus app credentials, exchanged for short-lived
    /// access tokens
    RefreshToken {
        refresh_token: String,
        app_key: String,
        app_secret: String,
    },
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` references are substituted from the environment before
    /// parsing, so secrets need not live in the file itself.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.connector.auth {
            AuthConfig::AccessToken { access_token } => {
                if access_token.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "access_token cannot be empty".to_string(),
                    ));
                }
            }
            AuthConfig::RefreshToken {
                refresh_token,
                app_key,
                app_secret,
            } => {
                if refresh_token.is_empty() || app_key.is_empty() || app_secret.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "refresh_token, app_key and app_secret must all be set".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
