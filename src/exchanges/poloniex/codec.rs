use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::SignedRequest;
use crate::core::kernel::WsCodec;
use crate::core::types::Subscription;
use serde_json::{json, Map, Value};
use tokio_tungstenite::tungstenite::Message;

/// Decoded inbound frame. Every variant keeps the frame verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum PoloniexMessage {
    /// Reply to a keepalive ping
    Pong,
    /// Command acknowledgement such as `subscribe` or `list_subscriptions`
    Event { event: String, payload: Value },
    /// Error reported by the peer
    Error { message: String, payload: Value },
    /// Channel data, including `auth` results
    Data { channel: String, payload: Value },
    Unknown(Value),
}

impl PoloniexMessage {
    pub fn is_pong(&self) -> bool {
        matches!(self, Self::Pong)
    }

    /// The decoded frame, if the variant carries one
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Pong => None,
            Self::Event { payload, .. }
            | Self::Error { payload, .. }
            | Self::Data { payload, .. }
            | Self::Unknown(payload) => Some(payload),
        }
    }

    fn classify(value: Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        let event = field("event");
        let channel = field("channel");

        match (event, channel) {
            (Some(event), _) if event == "pong" => Self::Pong,
            (Some(event), _) if event == "error" => Self::Error {
                message: field("message").unwrap_or_default(),
                payload: value,
            },
            (Some(event), _) => Self::Event {
                event,
                payload: value,
            },
            (None, Some(channel)) => Self::Data {
                channel,
                payload: value,
            },
            (None, None) => Self::Unknown(value),
        }
    }
}

/// JSON frame codec shared by the spot and futures streams
#[derive(Debug, Clone, Copy, Default)]
pub struct PoloniexCodec;

impl PoloniexCodec {
    /// Authentication frame for private sessions
    pub fn encode_auth(&self, signed: &SignedRequest) -> Result<Message, ExchangeError> {
        Ok(text(&json!({
            "event": "subscribe",
            "channel": ["auth"],
            "params": {
                "key": signed.key,
                "signTimestamp": signed.timestamp,
                "signature": signed.signature,
            }
        })))
    }
}

fn text(frame: &Value) -> Message {
    Message::Text(frame.to_string())
}

fn command(event: &str, channels: &[String], symbols: Option<&[String]>) -> Map<String, Value> {
    let mut frame = Map::new();
    frame.insert("event".to_string(), json!(event));
    frame.insert("channel".to_string(), json!(channels));
    if let Some(symbols) = symbols {
        frame.insert("symbols".to_string(), json!(symbols));
    }
    frame
}

impl WsCodec for PoloniexCodec {
    type Message = PoloniexMessage;

    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError> {
        let mut frame = command(
            "subscribe",
            &subscription.channels,
            subscription.symbols.as_deref(),
        );
        for (key, value) in &subscription.extras {
            frame.insert(key.clone(), value.clone());
        }
        Ok(text(&Value::Object(frame)))
    }

    fn encode_unsubscription(
        &self,
        channels: &[String],
        symbols: Option<&[String]>,
    ) -> Result<Message, ExchangeError> {
        Ok(text(&Value::Object(command(
            "unsubscribe",
            channels,
            symbols,
        ))))
    }

    fn encode_unsubscribe_all(&self) -> Result<Message, ExchangeError> {
        Ok(text(&json!({"event": "unsubscribe_all"})))
    }

    fn encode_list_subscriptions(&self) -> Result<Message, ExchangeError> {
        Ok(text(&json!({"event": "list_subscriptions"})))
    }

    fn encode_ping(&self) -> Result<Message, ExchangeError> {
        Ok(text(&json!({"event": "ping"})))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                ExchangeError::DeserializationError(format!(
                    "Invalid UTF-8 in binary message: {}",
                    e
                ))
            })?,
            _ => return Ok(None), // control frames are handled by the transport
        };

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e))
        })?;

        Ok(Some(PoloniexMessage::classify(value)))
    }
}
