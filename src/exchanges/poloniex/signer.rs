use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{hmac_sha256_base64, RequestPayload, SignedRequest, Signer};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::{ExposeSecret, Secret};
use std::collections::BTreeMap;

/// Characters left unescaped in parameter values
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'!')
    .remove(b'\'');

const TIMESTAMP_PARAM: &str = "signTimestamp";
const WS_AUTH_METHOD: &str = "GET";
const WS_AUTH_PATH: &str = "/ws";

/// HMAC-SHA256 request signer for the Poloniex v3 API
pub struct PoloniexSigner {
    api_key: String,
    secret_key: Secret<String>,
}

impl std::fmt::Debug for PoloniexSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoloniexSigner")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl PoloniexSigner {
    pub fn new(api_key: String, secret_key: String) -> Result<Self, ExchangeError> {
        if api_key.is_empty() || secret_key.is_empty() {
            return Err(ExchangeError::AuthenticationConfiguration(
                "api_key and secret_key must both be set to sign requests".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            secret_key: Secret::new(secret_key),
        })
    }

    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Self::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        )
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Build the canonical parameter string for `payload`.
    ///
    /// Query mode merges the timestamp into the parameters, sorts by raw
    /// name (byte order) and percent-encodes values. Body mode signs the
    /// serialized JSON followed by the timestamp.
    pub fn canonical_string(
        payload: &RequestPayload,
        timestamp: u64,
    ) -> Result<String, ExchangeError> {
        match payload {
            RequestPayload::Query(params) => {
                let timestamp = timestamp.to_string();
                let mut sorted: BTreeMap<&str, &str> = BTreeMap::new();
                sorted.insert(TIMESTAMP_PARAM, timestamp.as_str());
                for (name, value) in params {
                    sorted.insert(name.as_str(), value.as_str());
                }

                Ok(sorted
                    .into_iter()
                    .map(|(name, value)| {
                        format!("{}={}", name, utf8_percent_encode(value, VALUE_ENCODE_SET))
                    })
                    .collect::<Vec<_>>()
                    .join("&"))
            }
            RequestPayload::Body(body) => {
                let body = serde_json::to_string(body)
                    .map_err(|e| ExchangeError::SerializationError(e.to_string()))?;
                Ok(format!(
                    "requestBody={}&{}={}",
                    body, TIMESTAMP_PARAM, timestamp
                ))
            }
        }
    }

    /// Sign the fixed websocket authentication payload
    pub fn sign_ws_auth(&self, timestamp: u64) -> Result<SignedRequest, ExchangeError> {
        self.sign_request(
            WS_AUTH_METHOD,
            WS_AUTH_PATH,
            &RequestPayload::empty(),
            timestamp,
        )
    }
}

impl Signer for PoloniexSigner {
    fn sign_request(
        &self,
        method: &str,
        path: &str,
        payload: &RequestPayload,
        timestamp: u64,
    ) -> Result<SignedRequest, ExchangeError> {
        let method = method.to_uppercase();
        let canonical = Self::canonical_string(payload, timestamp)?;
        let message = format!("{}\n{}\n{}", method, path, canonical);
        let signature = hmac_sha256_base64(
            self.secret_key.expose_secret().as_bytes(),
            message.as_bytes(),
        )?;

        Ok(SignedRequest {
            method,
            path: path.to_string(),
            canonical,
            timestamp,
            key: self.api_key.clone(),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: u64 = 1_700_000_000_000;

    fn signer() -> PoloniexSigner {
        PoloniexSigner::new("key".to_string(), "secret".to_string()).unwrap()
    }

    #[test]
    fn test_missing_credentials() {
        let result = PoloniexSigner::new(String::new(), "secret".to_string());
        assert!(matches!(
            result,
            Err(ExchangeError::AuthenticationConfiguration(_))
        ));

        let result = PoloniexSigner::from_config(&ExchangeConfig::read_only());
        assert!(matches!(
            result,
            Err(ExchangeError::AuthenticationConfiguration(_))
        ));
    }

    #[test]
    fn test_query_signature_vector() {
        let payload = RequestPayload::query(&[("symbol", "BTC_USDT"), ("limit", "10")]);
        let signed = signer().sign_request("GET", "/orders", &payload, TS).unwrap();

        assert_eq!(
            signed.canonical,
            "limit=10&signTimestamp=1700000000000&symbol=BTC_USDT"
        );
        assert_eq!(
            signed.signature,
            "Hwc4VpmXkAhZ7RDrn4hchwrEUdpY4l1nOBegBLpBWz4="
        );
        assert_eq!(signed.key, "key");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let payload = RequestPayload::query(&[("symbol", "BTC_USDT")]);
        let a = signer().sign_request("GET", "/orders", &payload, TS).unwrap();
        let b = signer().sign_request("GET", "/orders", &payload, TS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parameter_order_does_not_matter() {
        let forward = RequestPayload::query(&[("a", "1"), ("b", "2")]);
        let reverse = RequestPayload::query(&[("b", "2"), ("a", "1")]);

        let a = signer().sign_request("GET", "/x", &forward, TS).unwrap();
        let b = signer().sign_request("GET", "/x", &reverse, TS).unwrap();
        assert_eq!(a.canonical, "a=1&b=2&signTimestamp=1700000000000");
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn test_changing_a_value_changes_signature() {
        let ten = RequestPayload::query(&[("symbol", "BTC_USDT"), ("limit", "10")]);
        let eleven = RequestPayload::query(&[("symbol", "BTC_USDT"), ("limit", "11")]);

        let a = signer().sign_request("GET", "/orders", &ten, TS).unwrap();
        let b = signer().sign_request("GET", "/orders", &eleven, TS).unwrap();
        assert_ne!(a.signature, b.signature);
        assert_eq!(b.signature, "cfvgm3WZJoP18Q/OlIl7AT0Ass7PVOv94aSgqBNejf8=");
    }

    #[test]
    fn test_names_sort_by_bytes() {
        let payload = RequestPayload::query(&[("b", "1"), ("B", "2"), ("a", "3")]);
        let canonical = PoloniexSigner::canonical_string(&payload, 1).unwrap();
        assert_eq!(canonical, "B=2&a=3&b=1&signTimestamp=1");
    }

    #[test]
    fn test_value_encoding() {
        let payload = RequestPayload::query(&[("q", "a b/c~()*!'&=é")]);
        let canonical = PoloniexSigner::canonical_string(&payload, 1).unwrap();
        assert_eq!(canonical, "q=a%20b%2Fc~()*!'%26%3D%C3%A9&signTimestamp=1");
    }

    #[test]
    fn test_body_signature_vector() {
        let payload = RequestPayload::Body(json!({"symbol": "BTC_USDT"}));
        let signed = signer().sign_request("post", "/orders", &payload, TS).unwrap();

        assert_eq!(signed.method, "POST");
        assert_eq!(
            signed.canonical,
            r#"requestBody={"symbol":"BTC_USDT"}&signTimestamp=1700000000000"#
        );
        assert_eq!(
            signed.signature,
            "v725RxlNWe0ulRYUiz+e+eK0Nd1ylZLRCk/WSlREIfg="
        );
    }

    #[test]
    fn test_empty_body_stays_in_body_mode() {
        let canonical = PoloniexSigner::canonical_string(&RequestPayload::Body(json!({})), 5).unwrap();
        assert_eq!(canonical, "requestBody={}&signTimestamp=5");
    }

    #[test]
    fn test_ws_auth_payload() {
        let signed = signer().sign_ws_auth(TS).unwrap();
        assert_eq!(signed.method, "GET");
        assert_eq!(signed.path, "/ws");
        assert_eq!(signed.canonical, "signTimestamp=1700000000000");
        assert_eq!(
            signed.signature,
            "w51J9c+u25K2IpLHcUklMkSHeHEIVj8V9g4MQcQcsuM="
        );
    }
}
