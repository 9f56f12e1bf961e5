use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::registry::SubscriptionRegistry;
use crate::core::traits::MessageHandler;
use crate::core::types::{ConnectionState, Subscription};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Streaming session timing
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Bound on `connect()` and on each physical connection attempt
    pub connect_timeout_ms: u64,
    /// Interval between application-level pings
    pub heartbeat_interval_ms: u64,
    /// Fixed delay before retrying after a transport fault
    pub reconnect_delay_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 60_000,
            heartbeat_interval_ms: 5_000,
            reconnect_delay_ms: 1_000,
        }
    }
}

impl WsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

pub type FrameSink = Pin<Box<dyn Sink<Message, Error = ExchangeError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, ExchangeError>> + Send>>;

/// Opens physical connections.
///
/// Each call yields a fresh write half and read half; the supervisor owns
/// both for the lifetime of that connection.
#[async_trait]
pub trait WsTransport: Send + Sync + 'static {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), ExchangeError>;

    fn url(&self) -> &str;
}

/// Tungstenite-backed transport using the platform trust store
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    url: String,
}

impl TungsteniteTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl WsTransport for TungsteniteTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<(FrameSink, FrameStream), ExchangeError> {
        let (ws_stream, _) = connect_async(&self.url).await.map_err(|e| {
            ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e))
        })?;

        let (write, read) = ws_stream.split();
        let sink: FrameSink = Box::pin(write.sink_map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to send WebSocket message: {}", e))
        }));
        let stream: FrameStream = Box::pin(read.map(|frame| {
            frame.map_err(|e| ExchangeError::NetworkError(format!("WebSocket error: {}", e)))
        }));

        Ok((sink, stream))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// The one write path onto the current physical connection.
///
/// Every outbound frame (caller sends, pings, handshake, replay) is
/// serialized through this lock, so frames never interleave on the wire.
#[derive(Clone, Default)]
pub struct WsWriter {
    sink: Arc<Mutex<Option<FrameSink>>>,
    connected: Arc<AtomicBool>,
}

impl WsWriter {
    pub async fn send(&self, message: Message) -> Result<(), ExchangeError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(ExchangeError::NotConnected)?;
        sink.send(message).await
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn install(&self, sink: FrameSink) {
        *self.sink.lock().await = Some(sink);
        self.connected.store(true, Ordering::Release);
    }

    async fn discard(&self) {
        self.connected.store(false, Ordering::Release);
        self.sink.lock().await.take();
    }

    /// Send a close frame and shut the sink
    async fn close(&self) -> Result<(), ExchangeError> {
        self.connected.store(false, Ordering::Release);
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        let sent = sink.send(Message::Close(None)).await;
        let closed = sink.close().await;
        sent.and(closed)
    }
}

/// Runs on every new physical connection before the session is ready.
///
/// Private sessions use this to prove identity; the hook only writes,
/// it does not wait for the peer to acknowledge.
#[async_trait]
pub trait SessionHandshake: Send + Sync + 'static {
    async fn authenticate(&self, writer: &WsWriter) -> Result<(), ExchangeError>;
}

/// Connection statistics for monitoring
#[derive(Debug, Default)]
pub struct ConnectionStats {
    connections: AtomicU64,
    messages_received: AtomicU64,
    errors_reported: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatsSnapshot {
    pub connections: u64,
    pub messages_received: u64,
    pub errors_reported: u64,
}

impl ConnectionStats {
    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            errors_reported: self.errors_reported.load(Ordering::Relaxed),
        }
    }
}

struct Shared<C: WsCodec, T: WsTransport> {
    transport: T,
    codec: C,
    config: WsConfig,
    writer: WsWriter,
    registry: SubscriptionRegistry,
    handler: Arc<dyn MessageHandler<C::Message>>,
    handshake: Option<Arc<dyn SessionHandshake>>,
    state: watch::Sender<ConnectionState>,
    ready: watch::Sender<bool>,
    stats: ConnectionStats,
}

enum ReadOutcome {
    Cancelled,
    Dropped,
}

impl<C: WsCodec, T: WsTransport> Shared<C, T> {
    /// Move to `next` unless a disconnect already claimed the session
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closing || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    /// A panicking error handler is logged and otherwise ignored
    fn report(&self, error: ExchangeError) {
        self.stats.errors_reported.fetch_add(1, Ordering::Relaxed);
        if panic::catch_unwind(AssertUnwindSafe(|| self.handler.on_error(error))).is_err() {
            warn!("error handler panicked");
        }
    }

    /// Authenticate if required, signal readiness, then replay subscriptions
    async fn establish(&self) -> Result<(), ExchangeError> {
        if let Some(handshake) = &self.handshake {
            self.set_state(ConnectionState::Authenticating);
            handshake.authenticate(&self.writer).await?;
            debug!("authentication frame sent");
        }

        self.set_state(ConnectionState::Ready);
        self.ready.send_replace(true);
        self.replay().await
    }

    async fn replay(&self) -> Result<(), ExchangeError> {
        let count = self.registry.replay(&self.codec, &self.writer).await?;
        debug!(count, "subscriptions replayed");
        Ok(())
    }

    async fn read_frames(&self, mut stream: FrameStream, cancel: &CancellationToken) -> ReadOutcome {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return ReadOutcome::Cancelled,
                frame = stream.next() => frame,
            };

            match frame {
                Some(Ok(message)) => self.dispatch(message),
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    self.report(e);
                    return ReadOutcome::Dropped;
                }
                None => {
                    warn!("websocket closed by peer");
                    self.report(ExchangeError::NetworkError(
                        "WebSocket connection closed".to_string(),
                    ));
                    return ReadOutcome::Dropped;
                }
            }
        }
    }

    fn dispatch(&self, message: Message) {
        match self.codec.decode_message(message) {
            Ok(Some(decoded)) => {
                self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                let handled =
                    panic::catch_unwind(AssertUnwindSafe(|| self.handler.on_message(decoded)));
                match handled {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => self.report(e),
                    Err(_) => {
                        warn!("message handler panicked");
                        self.report(ExchangeError::Other(
                            "Message handler panicked".to_string(),
                        ));
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "failed to decode frame");
                self.report(e);
            }
        }
    }
}

async fn wait_ready(ready: &mut watch::Receiver<bool>) -> bool {
    ready.wait_for(|r| *r).await.is_ok()
}

/// Connect, serve and reconnect until cancelled
async fn receive_loop<C: WsCodec, T: WsTransport>(
    shared: Arc<Shared<C, T>>,
    cancel: CancellationToken,
) {
    let attempt_timeout = shared.config.connect_timeout();
    let reconnect_delay = shared.config.reconnect_delay();

    loop {
        shared.ready.send_replace(false);
        shared.set_state(ConnectionState::Connecting);

        let attempt = tokio::select! {
            _ = cancel.cancelled() => break,
            attempt = timeout(attempt_timeout, shared.transport.connect()) => attempt,
        };

        match attempt {
            Ok(Ok((sink, stream))) => {
                let connections = shared.stats.connections.fetch_add(1, Ordering::Relaxed) + 1;
                info!(url = %shared.transport.url(), connections, "websocket connected");
                shared.writer.install(sink).await;

                let established = tokio::select! {
                    _ = cancel.cancelled() => break,
                    established = shared.establish() => established,
                };

                match established {
                    Ok(()) => {
                        if let ReadOutcome::Cancelled = shared.read_frames(stream, &cancel).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "session setup failed");
                        shared.report(e);
                    }
                }

                shared.ready.send_replace(false);
                shared.writer.discard().await;
                shared.set_state(ConnectionState::Connecting);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "websocket connection attempt failed");
                shared.report(e);
            }
            Err(_) => {
                warn!("websocket connection attempt timed out");
                shared.report(ExchangeError::ConnectionTimeout(format!(
                    "connection attempt exceeded {:?}",
                    attempt_timeout
                )));
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(reconnect_delay) => {}
        }
        info!(url = %shared.transport.url(), "reconnecting websocket");
    }

    debug!("receive loop stopped");
}

/// Ping the peer while the session is ready
async fn keepalive_loop<C: WsCodec, T: WsTransport>(
    shared: Arc<Shared<C, T>>,
    cancel: CancellationToken,
) {
    let interval = shared.config.heartbeat_interval();
    let mut ready = shared.ready.subscribe();

    loop {
        let is_ready = tokio::select! {
            _ = cancel.cancelled() => break,
            is_ready = wait_ready(&mut ready) => is_ready,
        };
        if !is_ready {
            break;
        }

        match shared.codec.encode_ping() {
            Ok(ping) => {
                let sent = tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = shared.writer.send(ping) => sent,
                };
                if let Err(e) = sent {
                    debug!(error = %e, "keepalive ping not sent");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode keepalive ping"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(interval) => {}
        }
    }

    debug!("keepalive loop stopped");
}

struct SessionTasks {
    id: u64,
    cancel: CancellationToken,
    receive: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

impl SessionTasks {
    async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in [("keepalive", self.keepalive), ("receive", self.receive)] {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(task = name, "session task panicked");
                }
            }
        }
    }
}

/// Builder for [`WsSupervisor`]
pub struct WsSupervisorBuilder<C: WsCodec, T: WsTransport> {
    transport: T,
    codec: C,
    handler: Arc<dyn MessageHandler<C::Message>>,
    config: WsConfig,
    handshake: Option<Arc<dyn SessionHandshake>>,
}

impl<C: WsCodec, T: WsTransport> WsSupervisorBuilder<C, T> {
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    /// Run `handshake` on every new connection before replaying subscriptions
    pub fn with_handshake(mut self, handshake: Arc<dyn SessionHandshake>) -> Self {
        self.handshake = Some(handshake);
        self
    }

    pub fn build(self) -> WsSupervisor<C, T> {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (ready, _) = watch::channel(false);

        WsSupervisor {
            shared: Arc::new(Shared {
                transport: self.transport,
                codec: self.codec,
                config: self.config,
                writer: WsWriter::default(),
                registry: SubscriptionRegistry::new(),
                handler: self.handler,
                handshake: self.handshake,
                state,
                ready,
                stats: ConnectionStats::default(),
            }),
            tasks: Mutex::new(None),
            next_session: AtomicU64::new(1),
        }
    }
}

/// One logical streaming session over a sequence of physical connections.
///
/// After a successful `connect()` the session heals itself indefinitely:
/// transport faults are reported to the handler, the connection is
/// re-established after a fixed delay, and authentication plus every
/// tracked subscription are replayed. Only `disconnect()` ends it.
pub struct WsSupervisor<C: WsCodec, T: WsTransport> {
    shared: Arc<Shared<C, T>>,
    tasks: Mutex<Option<SessionTasks>>,
    next_session: AtomicU64,
}

impl<C: WsCodec, T: WsTransport> WsSupervisor<C, T> {
    pub fn builder(
        transport: T,
        codec: C,
        handler: impl MessageHandler<C::Message>,
    ) -> WsSupervisorBuilder<C, T> {
        WsSupervisorBuilder {
            transport,
            codec,
            handler: Arc::new(handler),
            config: WsConfig::default(),
            handshake: None,
        }
    }

    /// Start the session and wait until it is ready to carry traffic.
    ///
    /// The session is registered before the wait, so a `disconnect()` issued
    /// while connecting cancels it and this call returns `NotConnected`.
    #[instrument(skip(self), fields(url = %self.shared.transport.url()))]
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        let (id, cancel, mut ready) = {
            let mut tasks = self.tasks.lock().await;
            if tasks.is_some() || self.state() != ConnectionState::Idle {
                return Err(ExchangeError::AlreadyConnected);
            }

            self.shared.ready.send_replace(false);
            self.shared.state.send_replace(ConnectionState::Connecting);
            let ready = self.shared.ready.subscribe();

            let id = self.next_session.fetch_add(1, Ordering::Relaxed);
            let cancel = CancellationToken::new();
            *tasks = Some(SessionTasks {
                id,
                receive: tokio::spawn(receive_loop(self.shared.clone(), cancel.clone())),
                keepalive: tokio::spawn(keepalive_loop(self.shared.clone(), cancel.clone())),
                cancel: cancel.clone(),
            });
            (id, cancel, ready)
        };

        let bound = self.shared.config.connect_timeout();
        let is_ready = tokio::select! {
            _ = cancel.cancelled() => {
                info!("connect abandoned by disconnect");
                return Err(ExchangeError::NotConnected);
            }
            waited = timeout(bound, wait_ready(&mut ready)) => matches!(waited, Ok(true)),
        };

        if is_ready {
            info!("websocket session ready");
            return Ok(());
        }

        warn!(timeout = ?bound, "websocket session not ready in time");
        let mut tasks = self.tasks.lock().await;
        if tasks.as_ref().is_some_and(|session| session.id == id) {
            if let Some(session) = tasks.take() {
                session.shutdown().await;
                self.shared.ready.send_replace(false);
                self.shared.writer.discard().await;
                self.shared.state.send_replace(ConnectionState::Idle);
            }
        }
        Err(ExchangeError::ConnectionTimeout(format!(
            "Failed to connect to websocket within {:?}",
            bound
        )))
    }

    /// Stop both loops, close the connection and return to `Idle`
    #[instrument(skip(self), fields(url = %self.shared.transport.url()))]
    pub async fn disconnect(&self) -> Result<(), ExchangeError> {
        let mut tasks = self.tasks.lock().await;
        let Some(session) = tasks.take() else {
            return Err(ExchangeError::NotConnected);
        };

        self.shared.state.send_replace(ConnectionState::Closing);
        session.shutdown().await;
        self.shared.ready.send_replace(false);

        if let Err(e) = self.shared.writer.close().await {
            warn!(error = %e, "error while closing websocket");
        }

        self.shared.state.send_replace(ConnectionState::Idle);
        info!("websocket session closed");
        Ok(())
    }

    /// Serialize `frame` as JSON and write it on the current connection
    pub async fn send(&self, frame: &Value) -> Result<(), ExchangeError> {
        let text = serde_json::to_string(frame)
            .map_err(|e| ExchangeError::SerializationError(e.to_string()))?;
        self.send_raw(Message::Text(text)).await
    }

    pub async fn send_raw(&self, message: Message) -> Result<(), ExchangeError> {
        self.shared.writer.send(message).await
    }

    /// Track a subscription and send it now if the session is ready
    #[instrument(skip(self), fields(channels = ?subscription.channels))]
    pub async fn subscribe(&self, subscription: Subscription) -> Result<(), ExchangeError> {
        let frame = self.shared.codec.encode_subscription(&subscription)?;
        self.shared.registry.add(subscription);
        self.transmit_if_ready(frame).await
    }

    #[instrument(skip(self))]
    pub async fn unsubscribe(
        &self,
        channels: &[String],
        symbols: Option<&[String]>,
    ) -> Result<(), ExchangeError> {
        let frame = self.shared.codec.encode_unsubscription(channels, symbols)?;
        self.shared.registry.remove(channels, symbols);
        self.transmit_if_ready(frame).await
    }

    pub async fn unsubscribe_all(&self) -> Result<(), ExchangeError> {
        let frame = self.shared.codec.encode_unsubscribe_all()?;
        self.shared.registry.clear();
        self.transmit_if_ready(frame).await
    }

    /// Ask the peer for its view of this session's subscriptions
    pub async fn list_subscriptions(&self) -> Result<(), ExchangeError> {
        let frame = self.shared.codec.encode_list_subscriptions()?;
        self.send_raw(frame).await
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// True while a physical connection exists
    pub fn is_connected(&self) -> bool {
        self.shared.writer.is_connected()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.shared.registry
    }

    pub fn stats(&self) -> ConnectionStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn url(&self) -> &str {
        self.shared.transport.url()
    }

    /// Registry changes made before readiness reach the wire via replay
    async fn transmit_if_ready(&self, frame: Message) -> Result<(), ExchangeError> {
        if !*self.shared.ready.borrow() {
            return Ok(());
        }
        match self.shared.writer.send(frame).await {
            Err(ExchangeError::NotConnected) => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = WsConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_writer_without_connection() {
        let writer = WsWriter::default();
        assert!(!writer.is_connected());
        assert!(matches!(
            writer.send(Message::Text("{}".to_string())).await,
            Err(ExchangeError::NotConnected)
        ));
        assert!(writer.close().await.is_ok());
    }

    #[test]
    fn test_transport_url() {
        let transport = TungsteniteTransport::new("wss://ws.poloniex.com/ws/public");
        assert_eq!(transport.url(), "wss://ws.poloniex.com/ws/public");
    }
}
