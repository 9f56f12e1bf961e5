use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{timestamp_millis, RequestPayload, Signer};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, trace};

/// REST client trait for making HTTP requests
///
/// `execute` is the single primitive; the verb helpers are thin wrappers.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Execute a request
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - The API endpoint path
    /// * `authenticated` - Whether to sign the request
    /// * `query_params` - Query parameters as key-value pairs
    /// * `body` - Optional JSON body
    ///
    /// # Returns
    /// The response body as a JSON value
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        authenticated: bool,
        query_params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ExchangeError>;

    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        self.execute(Method::GET, endpoint, authenticated, query_params, None)
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.get(endpoint, query_params, authenticated).await?;
        from_value(value)
    }

    /// An empty JSON object is sent without a body and signed in query mode
    async fn post(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        let body = match body.as_object() {
            Some(fields) if fields.is_empty() => None,
            _ => Some(body),
        };
        self.execute(Method::POST, endpoint, authenticated, &[], body)
            .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.post(endpoint, body, authenticated).await?;
        from_value(value)
    }

    async fn delete(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        self.execute(Method::DELETE, endpoint, authenticated, query_params, None)
            .await
    }

    async fn delete_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.delete(endpoint, query_params, authenticated).await?;
        from_value(value)
    }
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to deserialize JSON: {}", e))
    })
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 5,
            user_agent: "polosdk/0.1".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn can_authenticate(&self) -> bool {
        self.signer.is_some()
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Map a response to JSON, or to the peer's reported error
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        let parsed = serde_json::from_str::<Value>(&response_text);
        if status == reqwest::StatusCode::OK {
            return parsed.map_err(|_| {
                ExchangeError::DeserializationError(format!(
                    "Response is not JSON: {}",
                    response_text
                ))
            });
        }

        let (code, message) = match parsed {
            Ok(body) => (
                body.get("code")
                    .and_then(Value::as_i64)
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                body.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| response_text.clone(), str::to_string),
            ),
            Err(_) => (i64::from(status.as_u16()), response_text),
        };

        Err(ExchangeError::ApiError { code, message })
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, query_params, body), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint))]
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        authenticated: bool,
        query_params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ExchangeError> {
        let url = self.build_url(endpoint);
        let mut request = self.client.request(method.clone(), &url);

        if !query_params.is_empty() {
            request = request.query(query_params);
        }

        let body_text = body
            .map(|b| {
                serde_json::to_string(b).map_err(|e| {
                    ExchangeError::SerializationError(format!(
                        "Failed to serialize request body: {}",
                        e
                    ))
                })
            })
            .transpose()?;

        if authenticated {
            let signer = self.signer.as_ref().ok_or_else(|| {
                ExchangeError::AuthenticationConfiguration(
                    "Authenticated endpoints require api_key and secret_key to be set".to_string(),
                )
            })?;

            let payload = match body {
                Some(b) => RequestPayload::Body(b.clone()),
                None => RequestPayload::query(query_params),
            };
            let signed =
                signer.sign_request(method.as_str(), endpoint, &payload, timestamp_millis())?;

            for (key, value) in signed.headers() {
                request = request.header(key, value);
            }
        }

        if let Some(text) = body_text {
            request = request
                .header("content-type", "application/json")
                .body(text);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }
}
