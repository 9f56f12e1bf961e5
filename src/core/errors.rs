use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: i64, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Signing was requested but no key/secret pair is configured
    #[error("Authentication configuration error: {0}")]
    AuthenticationConfiguration(String),

    #[error("Already connected to websocket")]
    AlreadyConnected,

    #[error("Not connected to websocket")]
    NotConnected,

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl ExchangeError {
    /// Lifecycle errors are raised synchronously by the offending call and
    /// never touch a running session
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyConnected | Self::NotConnected | Self::ConnectionTimeout(_)
        )
    }
}
