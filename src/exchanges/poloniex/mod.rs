pub mod auth;
pub mod codec;
pub mod signer;

pub mod builder;

// Re-export main components
pub use auth::WsAuthenticator;
pub use builder::{
    create_futures_stream, create_private_stream, create_public_stream, create_rest_client,
    create_stream, create_stream_with_config, stream_builder, PoloniexStream, StreamVariant,
};
pub use codec::{PoloniexCodec, PoloniexMessage};
pub use signer::PoloniexSigner;
