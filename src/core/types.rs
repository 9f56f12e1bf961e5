use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle of a streaming session.
///
/// `Idle -> Connecting -> Authenticating -> Ready -> Closing -> Idle`.
/// Only the supervisor drives transitions; `disconnect` may move any
/// non-idle state straight to `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticating,
    Ready,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// A desired channel subscription.
///
/// Identity is the ordered channel list plus the optional ordered symbol
/// list; `extras` are merged verbatim into the outbound subscribe frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub channels: Vec<String>,
    pub symbols: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Subscription {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            symbols: None,
            extras: Map::new(),
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn with_extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    /// True when both entries target the same channels and symbols
    pub fn same_target(&self, channels: &[String], symbols: Option<&[String]>) -> bool {
        self.channels == channels && self.symbols.as_deref() == symbols
    }
}

/// One item delivered to a channel-based consumer
#[derive(Debug)]
pub enum StreamEvent<M> {
    Message(M),
    Error(crate::core::errors::ExchangeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_builder() {
        let sub = Subscription::new(["book"])
            .with_symbols(["BTC_USDT", "ETH_USDT"])
            .with_extra("depth", json!(5));

        assert_eq!(sub.channels, vec!["book".to_string()]);
        assert_eq!(
            sub.symbols.as_deref(),
            Some(&["BTC_USDT".to_string(), "ETH_USDT".to_string()][..])
        );
        assert_eq!(sub.extras.get("depth"), Some(&json!(5)));
    }

    #[test]
    fn test_same_target_ignores_extras() {
        let sub = Subscription::new(["trades"])
            .with_symbols(["BTC_USDT"])
            .with_extra("depth", json!(5));
        let channels = vec!["trades".to_string()];
        let symbols = vec!["BTC_USDT".to_string()];

        assert!(sub.same_target(&channels, Some(symbols.as_slice())));
        assert!(!sub.same_target(&channels, None));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Authenticating.to_string(), "authenticating");
    }
}
