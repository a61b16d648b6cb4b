//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::penpot::client::{DEFAULT_API_URL, DEFAULT_USER_AGENT};

/// Environment variable overriding [`PenpotConfig::api_url`].
pub const ENV_API_URL: &str = "PENPOT_API_URL";
/// Environment variable overriding [`PenpotConfig::username`].
pub const ENV_USERNAME: &str = "PENPOT_USERNAME";
/// Environment variable overriding [`PenpotConfig::password`].
pub const ENV_PASSWORD: &str = "PENPOT_PASSWORD";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Penpot instance and account.
    #[serde(default)]
    pub penpot: PenpotConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// File cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Overrides file values with environment variables read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(url) = get(ENV_API_URL) {
            self.penpot.api_url = url;
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.penpot.username = Some(username);
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.penpot.password = Some(password);
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.penpot.api_url.as_str();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidApiUrl { url: url.to_string() });
        }
        if self.penpot.username.is_some() != self.penpot.password.is_some() {
            return Err(ConfigError::PartialCredentials);
        }
        for (setting, value) in [
            ("http.timeout_seconds", self.http.timeout_seconds),
            ("cache.ttl_seconds", self.cache.ttl_seconds),
            ("cache.max_files", self.cache.max_files),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSetting { setting });
            }
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel {
                level: self.logging.level.clone(),
                allowed: LOG_LEVELS.join(", "),
            });
        }
        Ok(())
    }
}

/// Penpot instance configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PenpotConfig {
    /// API root, e.g. `https://design.penpot.app/api`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Account e-mail.
    #[serde(default)]
    pub username: Option<String>,

    /// Account password.
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for PenpotConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for PenpotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenpotConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// `User-Agent` sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// File cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a fetched file stays fresh, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Maximum number of cached files.
    #[serde(default = "default_max_files")]
    pub max_files: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_files: default_max_files(),
        }
    }
}

const fn default_ttl() -> u64 {
    600
}

const fn default_max_files() -> u64 {
    32
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.penpot.api_url, DEFAULT_API_URL);
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.cache.ttl_seconds, 600);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "penpot": {
                "api_url": "https://penpot.example.com/api",
                "username": "ada@example.com",
                "password": "secret"
            },
            "http": {
                "timeout_seconds": 10,
                "user_agent": "penpot-mcp-test"
            },
            "cache": {
                "ttl_seconds": 60,
                "max_files": 4
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.penpot.api_url, "https://penpot.example.com/api");
        assert_eq!(config.penpot.username.as_deref(), Some("ada@example.com"));
        assert_eq!(config.http.timeout_seconds, 10);
        assert_eq!(config.http.user_agent, "penpot-mcp-test");
        assert_eq!(config.cache.max_files, 4);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: Config =
            serde_json::from_str(r#"{"penpot": {"api_url": "https://a.example/api"}}"#).unwrap();
        config.apply_env(|name| match name {
            ENV_API_URL => Some("https://b.example/api".to_string()),
            ENV_USERNAME => Some("bob@example.com".to_string()),
            ENV_PASSWORD => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.penpot.api_url, "https://b.example/api");
        assert_eq!(config.penpot.username.as_deref(), Some("bob@example.com"));
        assert_eq!(config.penpot.password, None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let config = PenpotConfig {
            password: Some("hunter2".to_string()),
            ..PenpotConfig::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn reject_bad_url_scheme() {
        let json = r#"{"penpot": {"api_url": "ftp://penpot.example"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_timeout() {
        let json = r#"{"http": {"timeout_seconds": 0}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroSetting { setting: "http.timeout_seconds" })
        ));

        let json = r#"{"cache": {"ttl_seconds": 0}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroSetting { setting: "cache.ttl_seconds" })
        ));
    }

    #[test]
    fn reject_invalid_log_level() {
        let json = r#"{"logging": {"level": "loud"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
