use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::timestamp_millis;
use crate::core::kernel::{SessionHandshake, WsWriter};
use crate::exchanges::poloniex::codec::PoloniexCodec;
use crate::exchanges::poloniex::signer::PoloniexSigner;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Sends the signed `auth` subscription on every new private connection.
///
/// A fresh timestamp is signed each time, so a reconnect never reuses an
/// earlier signature. The peer's answer arrives as ordinary `auth` channel
/// data through the message handler.
#[derive(Debug)]
pub struct WsAuthenticator {
    signer: PoloniexSigner,
    codec: PoloniexCodec,
}

impl WsAuthenticator {
    pub fn new(signer: PoloniexSigner) -> Self {
        Self {
            signer,
            codec: PoloniexCodec,
        }
    }

    /// Build the authentication frame for `timestamp`
    pub fn auth_frame(
        &self,
        timestamp: u64,
    ) -> Result<tokio_tungstenite::tungstenite::Message, ExchangeError> {
        let signed = self.signer.sign_ws_auth(timestamp)?;
        self.codec.encode_auth(&signed)
    }
}

#[async_trait]
impl SessionHandshake for WsAuthenticator {
    #[instrument(skip(self, writer), fields(key = %self.signer.api_key()))]
    async fn authenticate(&self, writer: &WsWriter) -> Result<(), ExchangeError> {
        let timestamp = timestamp_millis();
        let frame = self.auth_frame(timestamp)?;
        debug!(timestamp, "sending websocket authentication");
        writer.send(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio_tungstenite::tungstenite::Message;

    #[test]
    fn test_auth_frame_shape() {
        let signer = PoloniexSigner::new("key".to_string(), "secret".to_string()).unwrap();
        let auth = WsAuthenticator::new(signer);

        let frame = match auth.auth_frame(1_700_000_000_000).unwrap() {
            Message::Text(text) => serde_json::from_str::<Value>(&text).unwrap(),
            other => panic!("Expected text frame, got {:?}", other),
        };

        assert_eq!(frame["event"], "subscribe");
        assert_eq!(frame["channel"], serde_json::json!(["auth"]));
        assert_eq!(frame["params"]["key"], "key");
        assert_eq!(frame["params"]["signTimestamp"], 1_700_000_000_000_u64);
        assert_eq!(
            frame["params"]["signature"],
            "w51J9c+u25K2IpLHcUklMkSHeHEIVj8V9g4MQcQcsuM="
        );
    }

    #[tokio::test]
    async fn test_authenticate_without_connection() {
        let signer = PoloniexSigner::new("key".to_string(), "secret".to_string()).unwrap();
        let auth = WsAuthenticator::new(signer);

        let result = auth.authenticate(&WsWriter::default()).await;
        assert!(matches!(result, Err(ExchangeError::NotConnected)));
    }
}
