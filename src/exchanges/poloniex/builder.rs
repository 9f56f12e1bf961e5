use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    ReqwestRest, RestClientBuilder, RestClientConfig, TungsteniteTransport, WsConfig,
    WsSupervisor, WsSupervisorBuilder,
};
use crate::core::traits::MessageHandler;
use crate::exchanges::poloniex::{
    auth::WsAuthenticator,
    codec::{PoloniexCodec, PoloniexMessage},
    signer::PoloniexSigner,
};
use std::sync::Arc;
use tracing::debug;

const EXCHANGE_NAME: &str = "poloniex";

/// A Poloniex streaming session over tungstenite
pub type PoloniexStream = WsSupervisor<PoloniexCodec, TungsteniteTransport>;

/// Which Poloniex stream endpoint a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamVariant {
    SpotPublic,
    SpotPrivate,
    FuturesPublic,
    FuturesPrivate,
}

impl StreamVariant {
    pub const fn is_private(self) -> bool {
        matches!(self, Self::SpotPrivate | Self::FuturesPrivate)
    }

    pub const fn is_futures(self) -> bool {
        matches!(self, Self::FuturesPublic | Self::FuturesPrivate)
    }

    const fn suffix(self) -> &'static str {
        if self.is_private() {
            "private"
        } else {
            "public"
        }
    }

    /// Full stream URL for this variant under `config`
    pub fn url(self, config: &ExchangeConfig) -> String {
        let base = if self.is_futures() {
            config.futures_ws_base()
        } else {
            config.spot_ws_url()
        };
        join_url(base, self.suffix())
    }
}

fn join_url(base: &str, suffix: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

/// Prepare a session for `variant` so the caller can adjust timing before `build()`
///
/// Private variants fail with `AuthenticationConfiguration` when the config
/// carries no credentials.
pub fn stream_builder(
    config: &ExchangeConfig,
    variant: StreamVariant,
    handler: impl MessageHandler<PoloniexMessage>,
) -> Result<WsSupervisorBuilder<PoloniexCodec, TungsteniteTransport>, ExchangeError> {
    let url = variant.url(config);
    debug!(?variant, url = %url, "building poloniex stream");

    let mut builder = WsSupervisor::builder(TungsteniteTransport::new(url), PoloniexCodec, handler);

    if variant.is_private() {
        let signer = PoloniexSigner::from_config(config)?;
        builder = builder.with_handshake(Arc::new(WsAuthenticator::new(signer)));
    }

    Ok(builder)
}

/// Create a session for `variant` with default timing
pub fn create_stream(
    config: &ExchangeConfig,
    variant: StreamVariant,
    handler: impl MessageHandler<PoloniexMessage>,
) -> Result<PoloniexStream, ExchangeError> {
    create_stream_with_config(config, variant, handler, WsConfig::default())
}

pub fn create_stream_with_config(
    config: &ExchangeConfig,
    variant: StreamVariant,
    handler: impl MessageHandler<PoloniexMessage>,
    ws_config: WsConfig,
) -> Result<PoloniexStream, ExchangeError> {
    Ok(stream_builder(config, variant, handler)?
        .with_config(ws_config)
        .build())
}

/// Spot market data stream
pub fn create_public_stream(
    config: &ExchangeConfig,
    handler: impl MessageHandler<PoloniexMessage>,
) -> Result<PoloniexStream, ExchangeError> {
    create_stream(config, StreamVariant::SpotPublic, handler)
}

/// Spot account stream, authenticated on every connection
pub fn create_private_stream(
    config: &ExchangeConfig,
    handler: impl MessageHandler<PoloniexMessage>,
) -> Result<PoloniexStream, ExchangeError> {
    create_stream(config, StreamVariant::SpotPrivate, handler)
}

/// Futures market data stream
pub fn create_futures_stream(
    config: &ExchangeConfig,
    handler: impl MessageHandler<PoloniexMessage>,
) -> Result<PoloniexStream, ExchangeError> {
    create_stream(config, StreamVariant::FuturesPublic, handler)
}

/// REST client for `config`; signs requests only when credentials are present
pub fn create_rest_client(config: &ExchangeConfig) -> Result<ReqwestRest, ExchangeError> {
    let rest_config = RestClientConfig::new(
        config.rest_url().to_string(),
        EXCHANGE_NAME.to_string(),
    )
    .with_timeout(config.rest_timeout_seconds);

    let mut rest_builder = RestClientBuilder::new(rest_config);

    if config.has_credentials() {
        let signer = Arc::new(PoloniexSigner::from_config(config)?);
        rest_builder = rest_builder.with_signer(signer);
    }

    rest_builder.build()
}
