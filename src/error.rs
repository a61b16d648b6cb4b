//! Errors raised while loading `config.json` and the `PENPOT_*` overrides.
//!
//! Errors from the Penpot core live in [`crate::penpot::error`].
//!
//! The file may hold the account password, so no variant carries file
//! contents or credential values.

use std::path::PathBuf;

use thiserror::Error;

/// Why the server could not start from its configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("no Penpot MCP config at {path}")]
    NotFound {
        /// Path given on the command line.
        path: PathBuf,
    },

    #[error("cannot read Penpot MCP config {path}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not JSON, or a key no section knows about.
    #[error("invalid Penpot MCP config {path}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `penpot.api_url` (or `PENPOT_API_URL`) is not an HTTP URL.
    #[error("penpot.api_url '{url}' must start with http:// or https://")]
    InvalidApiUrl {
        /// The rejected URL.
        url: String,
    },

    /// Only one of `penpot.username` and `penpot.password` is set.
    #[error("penpot.username and penpot.password must be set together")]
    PartialCredentials,

    /// A timeout or cache bound that has to be positive is zero.
    #[error("{setting} must be greater than zero")]
    ZeroSetting {
        /// Dotted name of the setting, e.g. `cache.ttl_seconds`.
        setting: &'static str,
    },

    #[error("logging.level '{level}' is not one of: {allowed}")]
    InvalidLogLevel { level: String, allowed: String },
}

impl ConfigError {
    /// True for errors found by checking values rather than reading the file.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidApiUrl { .. }
                | Self::PartialCredentials
                | Self::ZeroSetting { .. }
                | Self::InvalidLogLevel { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_path() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/home/ada/.penpot-mcp/config.json"),
        };
        assert!(error.to_string().contains(".penpot-mcp/config.json"));
        assert!(!error.is_validation());
    }

    #[test]
    fn parse_error_hides_file_contents() {
        let source = serde_json::from_str::<serde_json::Value>(r#"{"password": "hunter2""#)
            .unwrap_err();
        let error = ConfigError::ParseError {
            path: PathBuf::from("config.json"),
            source,
        };
        assert!(!error.to_string().contains("hunter2"));
    }

    #[test]
    fn zero_setting_names_the_key() {
        let error = ConfigError::ZeroSetting {
            setting: "cache.ttl_seconds",
        };
        assert_eq!(error.to_string(), "cache.ttl_seconds must be greater than zero");
        assert!(error.is_validation());
    }
}
