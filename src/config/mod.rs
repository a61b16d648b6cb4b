//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk, applying
//! environment overrides and validating the result.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given on the command line (must exist)
//! 2. Default location, if present:
//!    - **Linux/macOS:** `~/.penpot-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.penpot-mcp\config.json`
//!
//! With neither, built-in defaults are used. `PENPOT_API_URL`,
//! `PENPOT_USERNAME` and `PENPOT_PASSWORD` override the file.

mod settings;

pub use settings::{
    CacheConfig, Config, HttpConfig, LoggingConfig, PenpotConfig, ENV_API_URL, ENV_PASSWORD,
    ENV_USERNAME,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.penpot-mcp/`
/// - **Windows:** `%USERPROFILE%\.penpot-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".penpot-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration, applies process environment overrides and validates it.
///
/// If `path` is `None`, the default location is used when it exists.
///
/// # Errors
///
/// Returns an error if:
/// - An explicit `path` does not exist
/// - The file cannot be read
/// - The JSON is malformed
/// - A value is invalid after overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Like [`load_config`], reading environment overrides through `lookup`.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config_path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            })
        }
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    let mut config = match config_path {
        Some(config_path) => {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: config_path.clone(),
                source: e,
            })?
        }
        None => Config::default(),
    };

    config.apply_env(lookup);
    config.validate()?;

    Ok(config)
}
