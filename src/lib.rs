pub mod core;
pub mod exchanges;

pub use crate::core::{
    config::ExchangeConfig,
    errors::ExchangeError,
    traits::{channel_handler, handler_fn, MessageHandler},
    types::*,
};
pub use crate::exchanges::poloniex::{PoloniexMessage, PoloniexStream, StreamVariant};
