//! HTTP transport.
//!
//! [`Transport`] is the seam between the search logic and the network: the
//! production implementation is [`HttpTransport`] (reqwest), tests plug in
//! scripted in-memory transports. [`RateLimitedTransport`] wraps any
//! transport so that every call passes through the shared [`RateLimiter`],
//! and [`ApiClient`] layers JSON/text/binary decoding on top.

use crate::error::{Result, SearchError};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use intelx_core::ApiConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-key";

/// HTTP method of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET with query parameters
    Get,
    /// POST with a JSON body
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A single call against the API, independent of the HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path below the base URL, starting with `/`
    pub path: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body for POST calls
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a POST request with a JSON body.
    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    /// Append a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Look up a query parameter by name.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends API requests and returns the raw body of 2xx responses.
///
/// Implementations must map non-2xx responses to [`SearchError::Http`] and
/// transport failures to [`SearchError::Network`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one call.
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>>;
}

/// reqwest-backed transport that attaches the API key to every call.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport for the given base URL and key.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(&ApiConfig {
            base_url: base_url.into(),
            api_key: Some(api_key.into()),
            ..ApiConfig::default()
        })
    }

    /// Create a transport from connection settings.
    ///
    /// # Errors
    /// Returns error if no API key is configured or the HTTP client cannot
    /// be created.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(intelx_core::ConfigError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Base URL calls are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::trace!(method = %request.method, %url, "Sending API request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .header(API_KEY_HEADER, &self.api_key);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Transport wrapper that waits on a shared [`RateLimiter`] before each call.
pub struct RateLimitedTransport {
    inner: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedTransport {
    /// Wrap a transport with the given limiter.
    #[must_use]
    pub fn new(inner: Arc<dyn Transport>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// The limiter shared by this transport.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl Transport for RateLimitedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        let _permit = self.limiter.acquire().await;
        self.inner.send(request).await
    }
}

/// Typed access to the API over a (rate limited) transport.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Wrap `transport` so that every call goes through `limiter`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            transport: Arc::new(RateLimitedTransport::new(transport, limiter)),
        }
    }

    /// Issue a call and decode the JSON response.
    pub async fn json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let body = self.transport.send(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Issue a call and return the body as text.
    pub async fn text(&self, request: &ApiRequest) -> Result<String> {
        let body = self.transport.send(request).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Issue a call and return the raw body.
    pub async fn bytes(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        self.transport.send(request).await
    }
}
