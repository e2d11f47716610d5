//! CLI module for toolbridge commands

pub mod cache;
pub mod tools;

pub use cache::CacheCommand;
pub use tools::{DescribeCommand, InvokeCommand, ListCommand};

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::config::{default_config_path, Config, ConfigError};
use crate::error::BridgeError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Resolve the config path given on the command line (or the default).
pub fn config_path(path: Option<&str>) -> PathBuf {
    path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the config (defaults when the file is absent) with environment
/// overrides applied. Callers that talk to the backend still need to
/// `validate` it.
pub fn load_config(path: Option<&str>) -> Result<Config> {
    let mut config = Config::load_or_default(config_path(path))?;
    config.apply_env_overrides();
    Ok(config)
}

/// Print a bridge result as pretty JSON, or fail with its error message.
fn print_result(value: &Value) -> Result<()> {
    if let Some(message) = error_message(value) {
        return Err(CliError::Failed(message.to_string()));
    }
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn error_message(value: &Value) -> Option<&str> {
    value.as_object()?.get("error")?.as_str()
}
