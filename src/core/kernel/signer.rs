use crate::core::errors::ExchangeError;
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// What a request carries besides its method and path.
///
/// The two signing modes are mutually exclusive: a request is signed
/// either over its query parameters or over its JSON body, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    /// Query parameters as name/value pairs, in any order
    Query(Vec<(String, String)>),
    /// A JSON body, signed over its serialized form
    Body(Value),
}

impl RequestPayload {
    pub fn empty() -> Self {
        Self::Query(Vec::new())
    }

    pub fn query<K, V>(params: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::Query(
            params
                .iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn is_body(&self) -> bool {
        matches!(self, Self::Body(_))
    }
}

/// A signed request, built fresh for each outbound call or frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: String,
    pub path: String,
    pub canonical: String,
    pub timestamp: u64,
    pub key: String,
    pub signature: String,
}

impl SignedRequest {
    /// Authentication headers attached to a REST call
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("key".to_string(), self.key.clone());
        headers.insert("signature".to_string(), self.signature.clone());
        headers.insert("signTimestamp".to_string(), self.timestamp.to_string());
        headers
    }
}

/// Signer trait for request authentication
///
/// Implementations must be deterministic: identical inputs and timestamp
/// produce an identical signature.
pub trait Signer: Send + Sync {
    /// Sign a request
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `path` - API endpoint path
    /// * `payload` - Query parameters or JSON body
    /// * `timestamp` - Request timestamp in milliseconds
    fn sign_request(
        &self,
        method: &str,
        path: &str,
        payload: &RequestPayload,
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError>;
}

/// Base64 encoded HMAC-SHA256 of `payload` keyed with `secret`
pub fn hmac_sha256_base64(secret: &[u8], payload: &[u8]) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(payload);
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Current wall-clock time in epoch milliseconds
pub fn timestamp_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
