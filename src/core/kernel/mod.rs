/// Kernel - venue-agnostic transport layer
///
/// # Architecture
///
/// ## Transport Layer
/// - `RestClient`: unified HTTP client interface, `ReqwestRest` implementation
/// - `WsTransport`: opens physical WebSocket connections
/// - `WsSupervisor`: one self-healing logical stream over many connections
///
/// ## Authentication
/// - `Signer`: pluggable request signing over a `RequestPayload`
/// - `SessionHandshake`: per-connection hook run before subscriptions replay
///
/// ## Message Handling
/// - `WsCodec`: venue-specific frame encoding/decoding
/// - `SubscriptionRegistry`: the desired subscription set replayed on reconnect
///
/// ## Streaming Session
/// ```rust,no_run
/// use polosdk::core::kernel::*;
/// use polosdk::core::traits::handler_fn;
/// use polosdk::core::types::Subscription;
/// use polosdk::exchanges::poloniex::{PoloniexCodec, PoloniexMessage};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TungsteniteTransport::new("wss://ws.poloniex.com/ws/public");
/// let handler = handler_fn(
///     |msg: PoloniexMessage| {
///         println!("{:?}", msg);
///         Ok(())
///     },
///     |err| eprintln!("stream error: {}", err),
/// );
/// let stream = WsSupervisor::builder(transport, PoloniexCodec, handler).build();
///
/// stream.subscribe(Subscription::new(["book"]).with_symbols(["BTC_USDT"])).await?;
/// stream.connect().await?;
/// // ... reconnects and resubscribes on its own until:
/// stream.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod registry;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use registry::SubscriptionRegistry;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{hmac_sha256_base64, timestamp_millis, RequestPayload, SignedRequest, Signer};
pub use ws::{
    ConnectionStatsSnapshot, FrameSink, FrameStream, SessionHandshake, TungsteniteTransport,
    WsConfig, WsSupervisor, WsSupervisorBuilder, WsTransport, WsWriter,
};
