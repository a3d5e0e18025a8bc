//! Network access for intercepted requests.
//!
//! ### Requests
//! - Method, canonical URL and an optional `Accept` header
//! - Only `GET` requests are retrieval requests and ever touch a store
//!
//! ### Network seam
//! - [`Network`] is the single operation the strategies need: one fetch attempt
//! - A non-2xx status is a successful fetch, only transport failures are errors
//!
//! ### HTTP client
//! - rustls, gzip/brotli/deflate, limited redirects
//! - Max body bytes: 5MB (configurable)

pub mod url;

use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, resolve};
pub use reqwest::Method;

use swcache_core::{AppConfig, CacheKey, Error, ResponseSnapshot};

/// A request issued by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: ::url::Url,
    pub accept: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: ::url::Url) -> Self {
        Self { method, url, accept: None }
    }

    pub fn get(url: ::url::Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Whether this is a read-only request the worker intercepts.
    pub fn is_retrieval(&self) -> bool {
        self.method == Method::GET
    }

    /// Normalized identity used to read and write stores.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method.as_str(), self.url.as_str())
    }
}

/// Errors from a single network attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Connect(String),

    #[error("{size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    #[error("failed to read response: {0}")]
    Body(String),
}

impl From<NetworkError> for Error {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Timeout(_) => Error::FetchTimeout(err.to_string()),
            NetworkError::TooLarge { .. } => Error::FetchTooLarge(err.to_string()),
            NetworkError::Connect(_) | NetworkError::Body(_) => Error::HttpError(err.to_string()),
        }
    }
}

/// One network fetch attempt.
///
/// Implementations never retry and never consult a store.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sw-cache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sw-cache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP client backing the worker's network attempts.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout(self.config.timeout)
            } else {
                NetworkError::Connect(e.to_string())
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(NetworkError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() { NetworkError::Timeout(self.config.timeout) } else { NetworkError::Body(e.to_string()) }
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(NetworkError::TooLarge { size: bytes.len() as u64, limit: self.config.max_bytes });
        }

        tracing::debug!(
            "fetched {} {} -> {} ({}) in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ResponseSnapshot::new(final_url, status.as_u16(), headers, bytes.to_vec()))
    }
}
