//! Network fetch capability.
//!
//! ### Failure model
//! - Timeouts, DNS failures and refused connections all surface as
//!   `NetworkError`; callers treat every variant the same way.
//! - Non-2xx statuses are not errors. They come back as responses and the
//!   caching layer decides whether to store them.
//!
//! ### Response tainting
//! - Responses whose final URL shares the configured origin are `basic`.
//! - Everything else is `cors`.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 20MB (configurable)

pub mod stub;
pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use swcache_core::{Headers, Request, Response, ResponseType};

pub use self::url::{UrlError, canonicalize, resolve, same_origin};
pub use stub::StubNetwork;

/// Errors from a single network attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response too large: {0}")]
    TooLarge(String),
}

/// Async request-in, response-out network access.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform exactly one network attempt for `request`.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sw-cache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin whose responses are classified as `basic`.
    pub origin: Option<::url::Origin>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sw-cache/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

/// reqwest-backed `Network`.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, NetworkError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| NetworkError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn classify(&self, final_url: &::url::Url) -> ResponseType {
        match &self.config.origin {
            Some(origin) if *origin == final_url.origin() => ResponseType::Basic,
            _ => ResponseType::Cors,
        }
    }
}

fn transport_error(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() { NetworkError::Timeout(err.to_string()) } else { NetworkError::Unreachable(err.to_string()) }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(NetworkError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(transport_error)?;
        if bytes.len() > self.config.max_bytes {
            return Err(NetworkError::TooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
            response_type: self.classify(&final_url),
            url: Some(final_url),
        })
    }
}
