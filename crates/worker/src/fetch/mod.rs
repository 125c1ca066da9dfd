//! Network side of the worker.
//!
//! ### URL Canonicalization
//! - Trim whitespace, require an http(s) scheme
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Failure mapping
//! - Connection errors, timeouts and aborted requests all surface as
//!   `Error::NetworkFailure`, which the interceptor treats as "offline".
//! - Non-2xx statuses are *not* failures; they are returned to the page as-is.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod request;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use pwa_core::{AppConfig, Error};
use reqwest::Client;
use std::time::{Duration, Instant};

pub use request::{Destination, OFFLINE_ERROR, OfflineFallback, Request, Response, ResponseSource};
pub use reqwest::{Method, StatusCode};
pub use url::{UrlError, canonicalize, filename, is_same_origin, parse_origin, resolve};

/// Anything that can perform a network fetch on the worker's behalf.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch `request` from the network.
    ///
    /// Resolves with whatever response the server sent, including error
    /// statuses. Rejects only when no response was obtained.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pwa-worker/0.1")
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
            user_agent: "pwa-worker/0.1".to_string(),
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

/// reqwest-backed [`Network`].
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
            .map_err(|e| Error::CapabilityUnsupported(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

fn network_failure(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::NetworkFailure(format!("timed out: {err}"))
    } else {
        Error::NetworkFailure(err.to_string())
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| network_failure(&e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::NetworkFailure(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body: Bytes = response.bytes().await.map_err(|e| network_failure(&e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::NetworkFailure(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(Response { url: request.url.clone(), status, headers, body, source: ResponseSource::Network })
    }
}
