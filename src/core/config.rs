use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

pub const DEFAULT_REST_URL: &str = "https://api.poloniex.com";
pub const DEFAULT_WS_URL: &str = "wss://ws.poloniex.com/ws/";
pub const DEFAULT_FUTURES_WS_URL: &str = "wss://ws.poloniex.com/ws/v3/";
pub const DEFAULT_REST_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub futures_ws_url: Option<String>,
    pub rest_timeout_seconds: u64,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 6)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("ws_url", &self.ws_url)?;
        state.serialize_field("futures_ws_url", &self.futures_ws_url)?;
        state.serialize_field("rest_timeout_seconds", &self.rest_timeout_seconds)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            #[serde(default)]
            api_key: String,
            #[serde(default)]
            secret_key: String,
            base_url: Option<String>,
            ws_url: Option<String>,
            futures_ws_url: Option<String>,
            rest_timeout_seconds: Option<u64>,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            secret_key: Secret::new(helper.secret_key),
            base_url: helper.base_url,
            ws_url: helper.ws_url,
            futures_ws_url: helper.futures_ws_url,
            rest_timeout_seconds: helper
                .rest_timeout_seconds
                .unwrap_or(DEFAULT_REST_TIMEOUT_SECONDS),
        })
    }
}

impl ExchangeConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            base_url: None,
            ws_url: None,
            futures_ws_url: None,
            rest_timeout_seconds: DEFAULT_REST_TIMEOUT_SECONDS,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY` (e.g., `POLONIEX_API_KEY`)
    /// - `{PREFIX}_SECRET_KEY` (e.g., `POLONIEX_SECRET_KEY`)
    /// - `{PREFIX}_BASE_URL` (optional)
    /// - `{PREFIX}_WS_URL` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let api_key_var = format!("{}_API_KEY", prefix);
        let secret_key_var = format!("{}_SECRET_KEY", prefix);

        let api_key = env::var(&api_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_key_var))?;

        let secret_key = env::var(&secret_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(secret_key_var))?;

        let mut config = Self::new(api_key, secret_key);
        config.base_url = env::var(format!("{}_BASE_URL", prefix)).ok();
        config.ws_url = env::var(format!("{}_WS_URL", prefix)).ok();
        Ok(config)
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no file, fall through to process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Configuration for public market data only
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Check if this configuration has valid credentials for authenticated operations
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.secret_key.expose_secret().is_empty()
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    #[must_use]
    pub fn futures_ws_url(mut self, futures_ws_url: String) -> Self {
        self.futures_ws_url = Some(futures_ws_url);
        self
    }

    #[must_use]
    pub const fn rest_timeout_seconds(mut self, seconds: u64) -> Self {
        self.rest_timeout_seconds = seconds;
        self
    }

    pub fn rest_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_REST_URL)
    }

    pub fn spot_ws_url(&self) -> &str {
        self.ws_url.as_deref().unwrap_or(DEFAULT_WS_URL)
    }

    pub fn futures_ws_base(&self) -> &str {
        self.futures_ws_url
            .as_deref()
            .unwrap_or(DEFAULT_FUTURES_WS_URL)
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_redacts_secrets() {
        let config = ExchangeConfig::new("my-key".to_string(), "my-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("my-key"));
        assert!(!json.contains("my-secret"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn test_defaults() {
        let config = ExchangeConfig::read_only();
        assert!(!config.has_credentials());
        assert_eq!(config.rest_url(), DEFAULT_REST_URL);
        assert_eq!(config.spot_ws_url(), DEFAULT_WS_URL);
        assert_eq!(config.rest_timeout_seconds, 5);
    }

    #[test]
    fn test_overrides() {
        let config = ExchangeConfig::new("k".to_string(), "s".to_string())
            .base_url("http://localhost:8080".to_string())
            .ws_url("ws://localhost:9000/ws/".to_string());
        assert!(config.has_credentials());
        assert_eq!(config.rest_url(), "http://localhost:8080");
        assert_eq!(config.spot_ws_url(), "ws://localhost:9000/ws/");
    }

    #[test]
    fn test_deserialize_without_credentials() {
        let config: ExchangeConfig =
            serde_json::from_str(r#"{"base_url":"http://127.0.0.1:1"}"#).unwrap();
        assert!(!config.has_credentials());
        assert_eq!(config.rest_url(), "http://127.0.0.1:1");
        assert_eq!(config.rest_timeout_seconds, DEFAULT_REST_TIMEOUT_SECONDS);
    }
}
