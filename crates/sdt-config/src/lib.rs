//! Simple Diet Tracker configuration
//!
//! Configuration is read from a TOML file. Secrets may be supplied through
//! the environment instead of the file:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `APP_SECRET` | `app_secret` |
//! | `APP_ID` | `app_id` |

use std::path::Path;
use std::time::Duration;

use sdt_common::Environment;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file does not exist: {0}")]
    Missing(String),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("Required value is missing: {0}")]
    Required(&'static str),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub env: Environment,

    /// Path of the SQLite database file
    #[serde(default)]
    pub storage_path: String,

    #[serde(default)]
    pub http_server: HttpServerConfig,

    #[serde(default)]
    pub clients: ClientsConfig,

    /// HS256 secret shared with the identity service
    #[serde(default)]
    pub app_secret: String,

    /// Application id presented to the identity service on login
    #[serde(default)]
    pub app_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_address() -> String { "localhost:8080".to_string() }
fn default_timeout_ms() -> u64 { 4_000 }

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HttpServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientsConfig {
    #[serde(default)]
    pub identity: IdentityClientConfig,
}

/// Remote identity service client settings
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClientConfig {
    #[serde(default = "default_identity_address")]
    pub address: String,
    #[serde(default = "default_identity_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries_count")]
    pub retries_count: u32,
}

fn default_identity_address() -> String { "http://localhost:44044".to_string() }
fn default_identity_timeout_ms() -> u64 { 5_000 }
fn default_retries_count() -> u32 { 3 }

impl Default for IdentityClientConfig {
    fn default() -> Self {
        Self {
            address: default_identity_address(),
            timeout_ms: default_identity_timeout_ms(),
            retries_count: default_retries_count(),
        }
    }
}

impl IdentityClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from a TOML file, then apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Missing(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_toml(&raw)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `APP_SECRET` / `APP_ID` overrides from the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("APP_SECRET").filter(|s| !s.is_empty()) {
            self.app_secret = secret;
        }

        if let Some(raw) = lookup("APP_ID").filter(|s| !s.is_empty()) {
            let id = raw.parse::<i32>().map_err(|e| ConfigError::Invalid {
                key: "APP_ID",
                message: e.to_string(),
            })?;
            self.app_id = Some(id);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_path.trim().is_empty() {
            return Err(ConfigError::Required("storage_path"));
        }
        if self.app_secret.is_empty() {
            return Err(ConfigError::Required("app_secret"));
        }
        if self.app_id.is_none() {
            return Err(ConfigError::Required("app_id"));
        }
        if self.http_server.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "http_server.timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Application id; only valid after [`Config::validate`] succeeded.
    pub fn app_id(&self) -> i32 {
        self.app_id.unwrap_or_default()
    }
}
