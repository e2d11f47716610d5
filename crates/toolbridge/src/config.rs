//! Bridge configuration (`~/.toolbridge/config.yaml`).
//!
//! Every section has defaults, so a partial file (or no file at all) is
//! valid YAML input. `validate` is what rejects unusable values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding `backend.user`.
pub const ENV_BACKEND_USER: &str = "TOOLBRIDGE_BACKEND_USER";

/// Environment variable overriding `backend.password`.
pub const ENV_BACKEND_PASSWORD: &str = "TOOLBRIDGE_BACKEND_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Directory holding the config file, the log file and the schema database.
pub fn toolbridge_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolbridge")
}

pub fn default_config_path() -> PathBuf {
    toolbridge_home().join("config.yaml")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

/// Connection to the enterprise backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub client_id: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub timeout_secs: u64,
    pub endpoints: EndpointsConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: "300".to_string(),
            user: String::new(),
            password: String::new(),
            timeout_secs: 30,
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Backend endpoint identifiers, sent as the `id` query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub list: String,
    pub describe: String,
    pub invoke: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            list: "MCP_TOOL_LIST".to_string(),
            describe: "MCP_TOOL_DETAIL".to_string(),
            invoke: "USE_MCP_TOOL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// What `invoke` does for a tool that was never described.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissPolicy {
    /// Refuse the call with `SchemaNotFound`.
    #[default]
    Reject,
    /// Send the raw arguments under `IMPORT.IMPORTING_DATA`.
    Forward,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// SQLite file; defaults to `~/.toolbridge/schemas.db`.
    pub path: Option<PathBuf>,
    pub on_miss: MissPolicy,
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| toolbridge_home().join("schemas.db"))
    }
}

/// Where the MCP server listens in HTTP mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            path: "/mcp".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load configuration from a file, or use defaults if it doesn't exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found, using defaults: {}", path.display());
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Apply credential overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup(ENV_BACKEND_USER) {
            log::debug!("backend.user overridden by {}", ENV_BACKEND_USER);
            self.backend.user = user;
        }
        if let Some(password) = lookup(ENV_BACKEND_PASSWORD) {
            log::debug!("backend.password overridden by {}", ENV_BACKEND_PASSWORD);
            self.backend.password = password;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.base_url must be set".into()));
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url must start with http:// or https:// (got '{}')",
                self.backend.base_url
            )));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend.timeout_secs must be greater than zero".into(),
            ));
        }

        let endpoints = &self.backend.endpoints;
        for (name, value) in [
            ("list", &endpoints.list),
            ("describe", &endpoints.describe),
            ("invoke", &endpoints.invoke),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend.endpoints.{} must not be empty",
                    name
                )));
            }
        }

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.path must start with '/' (got '{}')",
                self.server.path
            )));
        }
        Ok(())
    }
}
