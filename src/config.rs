//! Configuration loaded from the environment

use std::env;
use thiserror::Error;

/// Environment variable holding the TheTVDB API key
pub const API_KEY_VAR: &str = "THETVDB_KEY";
/// Environment variable holding an optional TheTVDB subscriber PIN
pub const PIN_VAR: &str = "THETVDB_PIN";
/// Environment variable overriding the TheTVDB endpoint
pub const BASE_URL_VAR: &str = "THETVDB_BASE_URL";

/// Default TheTVDB v4 endpoint
pub const DEFAULT_BASE_URL: &str = "https://api4.thetvdb.com/v4";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential is not set
    #[error("'{0}' env var is not set!")]
    MissingCredential(&'static str),
}

/// Credentials and endpoint of the remote episode catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub pin: Option<String>,
    pub base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR).ok_or(ConfigError::MissingCredential(API_KEY_VAR))?;

        Ok(Self {
            api_key,
            pin: non_empty(PIN_VAR),
            base_url: non_empty(BASE_URL_VAR)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingCredential(API_KEY_VAR))));

        let result = Config::from_lookup(lookup(&[(API_KEY_VAR, "  ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = Config::from_lookup(lookup(&[(API_KEY_VAR, "secret")])).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.pin, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        let config = Config::from_lookup(lookup(&[
            (API_KEY_VAR, "secret"),
            (PIN_VAR, "1234"),
            (BASE_URL_VAR, "http://localhost:8080/v4/"),
        ]))
        .unwrap();
        assert_eq!(config.pin.as_deref(), Some("1234"));
        assert_eq!(config.base_url, "http://localhost:8080/v4");
    }
}
