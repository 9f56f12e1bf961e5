use crate::core::errors::ExchangeError;
use crate::core::types::Subscription;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for venue-specific WebSocket message encoding/decoding
///
/// The supervisor is generic over this trait; everything that differs
/// between stream variants in frame shape lives behind it.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed inbound messages
    type Message: Send + 'static;

    /// Encode one subscribe frame for a tracked subscription
    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError>;

    /// Encode an unsubscribe frame
    fn encode_unsubscription(
        &self,
        channels: &[String],
        symbols: Option<&[String]>,
    ) -> Result<Message, ExchangeError>;

    fn encode_unsubscribe_all(&self) -> Result<Message, ExchangeError>;

    fn encode_list_subscriptions(&self) -> Result<Message, ExchangeError>;

    /// Encode the application-level liveness frame
    fn encode_ping(&self) -> Result<Message, ExchangeError>;

    /// Decode a raw WebSocket message into a typed message
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Control frame, ignored
    /// - `Err(error)` - Failed to decode message
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
